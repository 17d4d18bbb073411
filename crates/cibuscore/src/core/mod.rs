//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

// Re-exports for convenience
pub use config::{BackendKind, ConfigError, StoreConfig};
pub use error::{BackendError, StoreError, StoreResult};
pub use logging::init_logger;
