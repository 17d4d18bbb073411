//! Object-store-backed coupon store.
//!
//! Keys:
//! ```text
//! new/{id}
//! used/{id}
//! ```
//!
//! Object stores offer no move, so redemption is a copy to `used/` followed
//! by a delete from `new/`. The delete can fail on its own (crash, transient
//! error), leaving the coupon under both prefixes. That state means "used";
//! the next `use_coupon` for the id, or [`ObjectCouponStore::reconcile`],
//! deletes the leftover.
//!
//! A copy that reports failure may still have landed (lost response, timeout
//! after the bucket finished). The store then reads both prefixes again and
//! completes the move if the coupon reached `used/`.
//!
//! Two `use_coupon` calls racing on the same id can both see it only in
//! `new/` and both copy and delete. Both end with the coupon in `used/` and
//! the second delete finds nothing, which counts as success, so both callers
//! report success.

use std::time::Duration;

use async_trait::async_trait;

use super::{bounded, decode_record, resolve, CouponStore, Location, Transition};
use crate::core::error::{BackendError, StoreError, StoreResult};
use crate::coupon::{is_valid_id, Coupon};

/// The primitives the object store variant needs from a bucket.
#[async_trait]
pub trait ObjectBucket: Send + Sync {
    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Object body, or `None` if there is no such key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Writes `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), BackendError>;

    /// Server-side copy of `from` to `to`.
    async fn copy(&self, from: &str, to: &str) -> Result<(), BackendError>;

    /// Deletes `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// All keys starting with `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, BackendError>;

    /// Bucket description for logs (e.g. `s3://coupons`).
    fn describe(&self) -> String;
}

/// Coupon store over an [`ObjectBucket`].
pub struct ObjectCouponStore<B> {
    bucket: B,
    timeout: Duration,
}

impl<B: ObjectBucket> ObjectCouponStore<B> {
    pub fn new(bucket: B, timeout: Duration) -> Self {
        Self { bucket, timeout }
    }

    pub fn bucket(&self) -> &B {
        &self.bucket
    }

    async fn exists(&self, location: Location, id: &str) -> Result<bool, BackendError> {
        bounded(self.timeout, self.bucket.exists(&location.key(id))).await
    }

    async fn delete_new(&self, id: &str) -> Result<(), BackendError> {
        bounded(self.timeout, self.bucket.delete(&Location::New.key(id))).await
    }

    async fn new_ids(&self) -> Result<Vec<String>, BackendError> {
        let prefix = Location::New.prefix();
        let keys = bounded(self.timeout, self.bucket.list_keys(&prefix)).await?;
        Ok(keys
            .iter()
            .filter_map(|key| Location::New.id_from_key(key))
            .filter(|id| {
                let valid = is_valid_id(id);
                if !valid {
                    log::warn!("Skipping object new/{} whose name is not a valid coupon id", id);
                }
                valid
            })
            .map(str::to_owned)
            .collect())
    }

    /// Deletes the "new" copy of a coupon that is already in "used".
    ///
    /// The coupon is redeemed either way; a failure leaves a stale copy for
    /// the next call or [`Self::reconcile`] to heal.
    async fn finish_move(&self, id: &str) {
        if let Err(e) = self.delete_new(id).await {
            log::warn!(
                "Coupon {:?} copied to 'used' but not deleted from 'new' ({}); it will be healed on next use",
                id,
                e
            );
        }
    }

    /// Settles a `use` whose copy reported `copy_error`.
    async fn after_failed_copy(&self, id: &str, copy_error: BackendError) -> StoreResult<()> {
        let recheck = async {
            let in_new = self.exists(Location::New, id).await?;
            let in_used = self.exists(Location::Used, id).await?;
            Ok::<_, BackendError>(resolve(in_used, in_new))
        }
        .await;

        match recheck {
            // The copy landed despite the error
            Ok(Transition::Heal) => {
                log::warn!("Copy of coupon {:?} reported an error ({}) but landed in 'used'", id, copy_error);
                self.finish_move(id).await;
                Ok(())
            }
            // A concurrent call moved the source away first
            Ok(Transition::AlreadyUsed) => {
                log::info!("Coupon {:?} was redeemed concurrently", id);
                Err(StoreError::already_used(id))
            }
            _ => {
                log::error!("Failed to copy coupon {:?} to the 'used' folder: {}", id, copy_error);
                Err(copy_error.into())
            }
        }
    }

    /// Writes `coupon` under `new/`, replacing an existing record.
    pub async fn add(&self, coupon: &Coupon) -> StoreResult<()> {
        if !is_valid_id(&coupon.id) {
            return Err(BackendError::InvalidId(coupon.id.clone()).into());
        }
        let key = Location::New.key(&coupon.id);
        let record = coupon.to_record().map_err(|source| BackendError::Malformed {
            key: key.clone(),
            source,
        })?;
        bounded(self.timeout, self.bucket.put(&key, record)).await?;
        log::debug!("Added coupon {} to {}", coupon.id, self.bucket.describe());
        Ok(())
    }

    /// Deletes every `new/` object whose id also exists under `used/`.
    ///
    /// Returns how many stale copies were deleted.
    pub async fn reconcile(&self) -> StoreResult<usize> {
        let mut healed = 0;
        for id in self.new_ids().await? {
            if self.exists(Location::Used, &id).await? {
                log::warn!("Used coupon {} found in the 'new' folder. Deleting it", id);
                self.delete_new(&id).await?;
                healed += 1;
            }
        }
        Ok(healed)
    }
}

#[async_trait]
impl<B: ObjectBucket> CouponStore for ObjectCouponStore<B> {
    async fn list(&self) -> StoreResult<Vec<Coupon>> {
        let ids = self.new_ids().await?;

        // Listing returns keys only; every record needs its own GET
        let mut coupons = Vec::with_capacity(ids.len());
        for id in &ids {
            let key = Location::New.key(id);
            match bounded(self.timeout, self.bucket.get(&key)).await? {
                Some(body) => coupons.push(decode_record(&key, id, &body)?),
                None => log::debug!("Coupon {} disappeared while listing", id),
            }
        }

        log::debug!("Listed {} new coupons from {}", coupons.len(), self.bucket.describe());
        Ok(coupons)
    }

    async fn use_coupon(&self, id: &str) -> StoreResult<()> {
        if !is_valid_id(id) {
            log::info!("Coupon id {:?} is not a valid id", id);
            return Err(StoreError::not_exist(id));
        }

        // 'new' before 'used': a coupon only ever moves new -> used, so a
        // move landing between the two checks is still seen in 'used'
        let in_new = self.exists(Location::New, id).await?;
        let in_used = self.exists(Location::Used, id).await?;

        match resolve(in_used, in_new) {
            Transition::NotExist => {
                log::info!("Coupon {:?} doesn't exist", id);
                Err(StoreError::not_exist(id))
            }
            Transition::AlreadyUsed => {
                log::info!("Coupon {:?} is already used", id);
                Err(StoreError::already_used(id))
            }
            Transition::Heal => {
                log::warn!("Used coupon {:?} found in the 'new' folder. Deleting it", id);
                if let Err(e) = self.delete_new(id).await {
                    log::error!("Failed to delete stale 'new' copy of coupon {:?}: {}", id, e);
                    return Err(e.into());
                }
                Err(StoreError::already_used(id))
            }
            Transition::Redeem => {
                let new_key = Location::New.key(id);
                let used_key = Location::Used.key(id);

                log::info!("Moving coupon {:?} to the 'used' folder", id);
                if let Err(e) = bounded(self.timeout, self.bucket.copy(&new_key, &used_key)).await {
                    return self.after_failed_copy(id, e).await;
                }

                self.finish_move(id).await;
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        self.bucket.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryBucket;
    use pretty_assertions::assert_eq;

    fn store() -> ObjectCouponStore<MemoryBucket> {
        ObjectCouponStore::new(MemoryBucket::new(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_redeem_copies_then_deletes() {
        let store = store();
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();

        store.use_coupon("cid1").await.unwrap();

        assert!(!store.bucket().contains("new/cid1"));
        assert!(store.bucket().contains("used/cid1"));
        assert_eq!(store.bucket().copies(), 1);
        assert_eq!(store.bucket().deletes(), 1);
    }

    #[tokio::test]
    async fn test_already_used_takes_no_action() {
        let store = store();
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();
        store.use_coupon("cid1").await.unwrap();

        let result = store.use_coupon("cid1").await;

        assert!(matches!(result, Err(StoreError::AlreadyUsed { .. })));
        assert_eq!(store.bucket().copies(), 1);
        assert_eq!(store.bucket().deletes(), 1);
    }

    #[tokio::test]
    async fn test_not_exist_takes_no_action() {
        let store = store();

        let result = store.use_coupon("nope").await;

        assert!(matches!(result, Err(StoreError::NotExist { .. })));
        assert_eq!(store.bucket().copies(), 0);
        assert_eq!(store.bucket().deletes(), 0);
    }

    #[tokio::test]
    async fn test_copy_failure_leaves_coupon_new() {
        let store = store();
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();
        store.bucket().fail_copies(1);

        let result = store.use_coupon("cid1").await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.bucket().contains("new/cid1"));
        assert!(!store.bucket().contains("used/cid1"));
        assert_eq!(store.bucket().deletes(), 0);

        // Retrying lands in the redeem row again
        store.use_coupon("cid1").await.unwrap();
        assert!(store.bucket().contains("used/cid1"));
    }

    #[tokio::test]
    async fn test_copy_that_landed_despite_error_completes_the_move() {
        let store = store();
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();
        store.bucket().lose_copy_responses(1);

        store.use_coupon("cid1").await.unwrap();

        assert!(!store.bucket().contains("new/cid1"));
        assert!(store.bucket().contains("used/cid1"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(
            store.use_coupon("cid1").await,
            Err(StoreError::AlreadyUsed { .. })
        ));
    }

    #[tokio::test]
    async fn test_landed_copy_with_failed_delete_is_healed_later() {
        let store = store();
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();
        store.bucket().lose_copy_responses(1);
        store.bucket().fail_deletes(1);

        store.use_coupon("cid1").await.unwrap();
        assert!(store.bucket().contains("new/cid1"));

        assert_eq!(store.reconcile().await.unwrap(), 1);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_is_healed_on_next_use() {
        let store = store();
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();
        store.bucket().fail_deletes(1);

        store.use_coupon("cid1").await.unwrap();
        assert!(store.bucket().contains("new/cid1"));
        assert!(store.bucket().contains("used/cid1"));

        let result = store.use_coupon("cid1").await;

        assert!(matches!(result, Err(StoreError::AlreadyUsed { .. })));
        assert!(!store.bucket().contains("new/cid1"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_heal_is_unavailable() {
        let store = store();
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();
        store.bucket().copy_raw("new/cid1", "used/cid1");
        store.bucket().fail_deletes(1);

        let result = store.use_coupon("cid1").await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.bucket().contains("new/cid1"));

        // The next call completes the repair
        assert!(matches!(
            store.use_coupon("cid1").await,
            Err(StoreError::AlreadyUsed { .. })
        ));
        assert!(!store.bucket().contains("new/cid1"));
    }

    #[tokio::test]
    async fn test_slow_bucket_times_out() {
        let bucket = MemoryBucket::new().with_latency(Duration::from_millis(200));
        let store = ObjectCouponStore::new(bucket, Duration::from_millis(20));

        assert!(matches!(
            store.use_coupon("cid1").await,
            Err(StoreError::Unavailable(BackendError::Timeout(_)))
        ));
        assert!(matches!(
            store.list().await,
            Err(StoreError::Unavailable(BackendError::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn test_list_skips_folder_markers_and_nested_keys() {
        let store = store();
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();
        store.bucket().insert_raw("new/", Vec::new());
        store.bucket().insert_raw("new/archive/cid9", b"{}".to_vec());

        assert_eq!(store.list().await.unwrap(), vec![Coupon::new("cid1", "v1", 100)]);
    }

    #[tokio::test]
    async fn test_listed_ids_come_from_keys_and_are_redeemable() {
        let store = store();
        let record = Coupon::new("other", "v1", 100).to_record().unwrap();
        store.bucket().insert_raw("new/cid1", record);
        store.bucket().insert_raw("new/91+23", Coupon::new("91+23", "v2", 50).to_record().unwrap());

        let listed = store.list().await.unwrap();

        assert_eq!(listed, vec![Coupon::new("cid1", "v1", 100)]);
        for coupon in &listed {
            store.use_coupon(&coupon.id).await.unwrap();
        }
        assert!(store.bucket().contains("used/cid1"));
    }

    #[tokio::test]
    async fn test_list_fails_on_malformed_record() {
        let store = store();
        store.bucket().insert_raw("new/cid1", b"{\"id\":".to_vec());

        assert!(matches!(
            store.list().await,
            Err(StoreError::Unavailable(BackendError::Malformed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_reconcile_deletes_ghosts() {
        let store = store();
        for id in ["a", "b", "c"] {
            store.add(&Coupon::new(id, "v", 10)).await.unwrap();
        }
        store.bucket().copy_raw("new/a", "used/a");
        store.bucket().copy_raw("new/c", "used/c");

        assert_eq!(store.reconcile().await.unwrap(), 2);
        assert_eq!(store.bucket().keys_with_prefix("new/"), vec!["new/b".to_string()]);
    }
}
