//! Handler types and dependencies

use std::sync::Arc;

use cibuscore::core::retry::RetryConfig;
use cibuscore::CouponStore;

use crate::telegram::access::AllowList;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub store: Arc<dyn CouponStore>,
    pub allow_list: Arc<AllowList>,
    /// Reply to unauthorized senders
    pub debug: bool,
    /// Retry policy for `/list` store reads
    pub list_retry: RetryConfig,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(store: Arc<dyn CouponStore>, allow_list: AllowList, debug: bool) -> Self {
        Self {
            store,
            allow_list: Arc::new(allow_list),
            debug,
            list_retry: RetryConfig::store(),
        }
    }

    #[must_use]
    pub fn with_list_retry(mut self, list_retry: RetryConfig) -> Self {
        self.list_retry = list_retry;
        self
    }
}
