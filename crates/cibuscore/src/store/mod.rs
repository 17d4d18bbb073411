//! The coupon store: which coupons are new and which are used.
//!
//! ## Locations
//!
//! Every coupon id lives in exactly one of two locations:
//! ```text
//! new/{id}    unredeemed, listable
//! used/{id}   redeemed
//! ```
//!
//! ## Backends
//!
//! - `FilesystemStore` - a local directory, for testing. Redemption is an
//!   atomic rename.
//! - `ObjectCouponStore` - any `ObjectBucket` (S3 in production). Object
//!   stores have no move, so redemption is copy-then-delete and the store must
//!   tolerate being interrupted between the two.
//!
//! Both backends decide what to do from the same table in [`transition`],
//! fed by a fresh pair of existence checks on every call. Nothing is cached
//! in-process, so repeated or concurrent calls converge without a lock.

mod filesystem;
mod object;
#[cfg(feature = "s3")]
mod s3;
pub mod transition;

pub use filesystem::FilesystemStore;
pub use object::{ObjectBucket, ObjectCouponStore};
#[cfg(feature = "s3")]
pub use s3::S3Bucket;
pub use transition::{resolve, Transition};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::config::{BackendKind, StoreConfig};
use crate::core::error::{BackendError, StoreResult};
use crate::coupon::Coupon;

/// Durable bookkeeping of new vs. used coupons.
///
/// Implementations never cache coupon state; every call reads the backend.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Every coupon currently in the "new" location, in no particular order.
    ///
    /// Fails with `StoreError::Unavailable` when the backend cannot be read;
    /// an empty list always means there really are no new coupons.
    async fn list(&self) -> StoreResult<Vec<Coupon>>;

    /// Moves the coupon `id` from "new" to "used".
    ///
    /// Returns `Ok(())` when this call redeemed the coupon,
    /// `StoreError::AlreadyUsed` when it was redeemed before,
    /// `StoreError::NotExist` when no such coupon was ever provisioned and
    /// `StoreError::Unavailable` on backend failure. Safe to call any number
    /// of times.
    async fn use_coupon(&self, id: &str) -> StoreResult<()>;

    /// Backend description for logs.
    fn describe(&self) -> String;
}

/// One of the two logical coupon locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    New,
    Used,
}

impl Location {
    /// Directory name / key prefix segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::New => "new",
            Location::Used => "used",
        }
    }

    /// Object key prefix, including the trailing slash.
    pub fn prefix(&self) -> String {
        format!("{}/", self.as_str())
    }

    /// Object key of coupon `id` in this location.
    pub fn key(&self, id: &str) -> String {
        format!("{}/{}", self.as_str(), id)
    }

    /// Coupon id from an object key in this location.
    ///
    /// `None` for the bare prefix (folder marker objects) and for keys nested
    /// deeper than one level.
    pub fn id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|id| !id.is_empty() && !id.contains('/'))
    }
}

/// Decodes the record stored under `key` for coupon `id`.
///
/// The returned coupon always carries `id`: the key is what `use_coupon`
/// looks up, whatever the record body says.
pub(crate) fn decode_record(key: &str, id: &str, bytes: &[u8]) -> Result<Coupon, BackendError> {
    let mut coupon = Coupon::from_record(bytes).map_err(|source| BackendError::Malformed {
        key: key.to_string(),
        source,
    })?;
    if coupon.id != id {
        log::warn!("Record {} carries id {:?}; using {:?} from the key", key, coupon.id, id);
        coupon.id = id.to_string();
    }
    Ok(coupon)
}

/// Runs one backend call under `limit`.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| BackendError::Timeout(limit))?
}

// ============================================================================
// Factory
// ============================================================================

/// Initialize the coupon store selected by configuration.
///
/// # Errors
///
/// Fails when the filesystem root cannot be created, when the S3 backend is
/// selected without a bucket, or when the binary was built without `s3`.
pub async fn init_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn CouponStore>> {
    match config.backend {
        BackendKind::Filesystem => {
            log::info!("CouponStore: filesystem at {}", config.coupons_dir.display());
            let store = FilesystemStore::new(&config.coupons_dir, config.timeout).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "s3")]
        BackendKind::S3 => {
            let store = init_s3_store(config).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "s3"))]
        BackendKind::S3 => Err(anyhow::anyhow!(
            "COUPONS_BACKEND=s3 but cibuscore was built without the `s3` feature"
        )),
    }
}

/// Runs one reconciliation pass over the store selected by configuration.
///
/// Returns how many stale "new" copies were deleted.
pub async fn reconcile_store(config: &StoreConfig) -> anyhow::Result<usize> {
    let healed = match config.backend {
        BackendKind::Filesystem => {
            FilesystemStore::new(&config.coupons_dir, config.timeout)
                .await?
                .reconcile()
                .await?
        }
        #[cfg(feature = "s3")]
        BackendKind::S3 => init_s3_store(config).await?.reconcile().await?,
        #[cfg(not(feature = "s3"))]
        BackendKind::S3 => {
            return Err(anyhow::anyhow!(
                "COUPONS_BACKEND=s3 but cibuscore was built without the `s3` feature"
            ))
        }
    };

    log::info!("Reconciled {}: {} stale coupon(s) removed", config.location(), healed);
    Ok(healed)
}

/// Builds the S3 object store described by `config`.
#[cfg(feature = "s3")]
pub async fn init_s3_store(config: &StoreConfig) -> anyhow::Result<ObjectCouponStore<S3Bucket>> {
    let bucket = config
        .bucket
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("COUPONS_BUCKET must be set for the s3 backend"))?;

    log::info!(
        "CouponStore: s3 bucket={} region={:?} endpoint={:?}",
        bucket,
        config.s3_region,
        config.s3_endpoint
    );

    let s3 = S3Bucket::connect(bucket, config.s3_region.as_deref(), config.s3_endpoint.as_deref()).await;
    Ok(ObjectCouponStore::new(s3, config.timeout))
}
