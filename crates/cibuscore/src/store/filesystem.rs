//! Filesystem-backed coupon store, for local testing.
//!
//! ```text
//! {root}/
//!   new/{id}
//!   used/{id}
//! ```
//!
//! Redemption is a `rename` within one filesystem, which is atomic, so the
//! "in both locations" state only shows up if something outside the store
//! copies files around. The table is still applied in full.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;

use super::{bounded, decode_record, resolve, CouponStore, Location, Transition};
use crate::core::error::{BackendError, StoreError, StoreResult};
use crate::coupon::{is_valid_id, Coupon};

/// Coupon store over a local directory.
pub struct FilesystemStore {
    root: PathBuf,
    timeout: Duration,
}

impl FilesystemStore {
    /// Opens the store rooted at `root`, creating `new/` and `used/` if needed.
    pub async fn new(root: impl AsRef<Path>, timeout: Duration) -> Result<Self, BackendError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(Location::New.as_str())).await?;
        fs::create_dir_all(root.join(Location::Used.as_str())).await?;
        Ok(Self { root, timeout })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of coupon `id` in `location`.
    pub fn path_for(&self, location: Location, id: &str) -> PathBuf {
        self.root.join(location.as_str()).join(id)
    }

    async fn io_call<T, F>(&self, call: F) -> Result<T, BackendError>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        bounded(self.timeout, async { call.await.map_err(BackendError::from) }).await
    }

    async fn exists(&self, location: Location, id: &str) -> Result<bool, BackendError> {
        self.io_call(fs::try_exists(self.path_for(location, id))).await
    }

    /// Writes `coupon` into the "new" directory, replacing an existing record.
    pub async fn add(&self, coupon: &Coupon) -> StoreResult<()> {
        if !is_valid_id(&coupon.id) {
            return Err(BackendError::InvalidId(coupon.id.clone()).into());
        }
        let record = coupon.to_record().map_err(|source| BackendError::Malformed {
            key: Location::New.key(&coupon.id),
            source,
        })?;

        // Temp name starts with a dot so a concurrent list() skips it
        let path = self.path_for(Location::New, &coupon.id);
        let temp_path = self.root.join(Location::New.as_str()).join(format!(".{}.tmp", coupon.id));
        self.io_call(fs::write(&temp_path, record)).await?;
        self.io_call(fs::rename(&temp_path, &path)).await?;

        log::debug!("Added coupon {} at {}", coupon.id, path.display());
        Ok(())
    }

    async fn list_ids(&self, location: Location) -> Result<Vec<String>, BackendError> {
        let dir = self.root.join(location.as_str());
        let mut entries = self.io_call(fs::read_dir(&dir)).await?;

        let mut ids = Vec::new();
        while let Some(entry) = self.io_call(entries.next_entry()).await? {
            let file_type = self.io_call(entry.file_type()).await?;
            if !file_type.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if !is_valid_id(&name) {
                log::warn!("Skipping {} whose name is not a valid coupon id", dir.join(&name).display());
                continue;
            }
            ids.push(name);
        }

        Ok(ids)
    }

    /// Reads the record of `id`; `None` if it vanished meanwhile.
    async fn read(&self, location: Location, id: &str) -> Result<Option<Coupon>, BackendError> {
        match self.io_call(fs::read(self.path_for(location, id))).await {
            Ok(bytes) => decode_record(&location.key(id), id, &bytes).map(Some),
            Err(BackendError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deletes the "new" copy of `id`. A copy that is already gone counts as deleted.
    async fn remove_new(&self, id: &str) -> Result<(), BackendError> {
        match self.io_call(fs::remove_file(self.path_for(Location::New, id))).await {
            Err(BackendError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Removes every "new" file whose id is also in "used".
    ///
    /// Returns how many stale copies were deleted.
    pub async fn reconcile(&self) -> StoreResult<usize> {
        let mut healed = 0;
        for id in self.list_ids(Location::New).await? {
            if self.exists(Location::Used, &id).await? {
                log::warn!("Used coupon {} found in the new dir. Deleting it", id);
                self.remove_new(&id).await?;
                healed += 1;
            }
        }
        Ok(healed)
    }
}

#[async_trait]
impl CouponStore for FilesystemStore {
    async fn list(&self) -> StoreResult<Vec<Coupon>> {
        let ids = self.list_ids(Location::New).await?;

        let mut coupons = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(coupon) = self.read(Location::New, id).await? {
                coupons.push(coupon);
            }
        }

        log::debug!("Listed {} new coupons from {}", coupons.len(), self.root.display());
        Ok(coupons)
    }

    async fn use_coupon(&self, id: &str) -> StoreResult<()> {
        if !is_valid_id(id) {
            log::info!("Coupon id {:?} is not a valid id", id);
            return Err(StoreError::not_exist(id));
        }

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
                log::warn!("Used coupon {:?} found in the new dir. Deleting it", id);
                if let Err(e) = self.remove_new(id).await {
                    log::error!("Failed to delete stale new copy of coupon {:?}: {}", id, e);
                    return Err(e.into());
                }
                Err(StoreError::already_used(id))
            }
            Transition::Redeem => {
                let from = self.path_for(Location::New, id);
                let to = self.path_for(Location::Used, id);
                match self.io_call(fs::rename(&from, &to)).await {
                    Ok(()) => {
                        log::info!("Moved coupon {:?} to the used dir", id);
                        Ok(())
                    }
                    // Another call renamed it between our checks and the rename
                    Err(BackendError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                        log::info!("Coupon {:?} was redeemed concurrently", id);
                        Err(StoreError::already_used(id))
                    }
                    Err(e) => {
                        log::error!("Failed to move coupon {:?} to the used dir: {}", id, e);
                        Err(e.into())
                    }
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("filesystem:{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn create_temp_store() -> (FilesystemStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemStore::new(temp_dir.path(), Duration::from_secs(5))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_add_writes_record_and_overwrites() {
        let (store, _temp) = create_temp_store().await;
        let coupon = Coupon::new("coupon-id", "vendor", 100);

        store.add(&coupon).await.unwrap();
        assert!(store.path_for(Location::New, "coupon-id").is_file());

        // Adding an identical coupon again replaces the file
        store.add(&coupon).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![coupon]);
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_id() {
        let (store, _temp) = create_temp_store().await;
        let result = store.add(&Coupon::new("../escape", "vendor", 1)).await;
        assert!(matches!(result, Err(StoreError::Unavailable(BackendError::InvalidId(_)))));
    }

    #[tokio::test]
    async fn test_use_moves_file() {
        let (store, _temp) = create_temp_store().await;
        store.add(&Coupon::new("coupon-id", "vendor", 100)).await.unwrap();

        store.use_coupon("coupon-id").await.unwrap();

        assert!(!store.path_for(Location::New, "coupon-id").exists());
        assert!(store.path_for(Location::Used, "coupon-id").is_file());

        // Use again and fail
        assert!(matches!(
            store.use_coupon("coupon-id").await,
            Err(StoreError::AlreadyUsed { .. })
        ));

        // Use non-existing coupon and fail
        assert!(matches!(
            store.use_coupon("coupon-id-1").await,
            Err(StoreError::NotExist { .. })
        ));
    }

    #[tokio::test]
    async fn test_use_heals_copy_left_in_both_dirs() {
        let (store, _temp) = create_temp_store().await;
        let coupon = Coupon::new("cid1", "v1", 100);
        store.add(&coupon).await.unwrap();
        std::fs::copy(
            store.path_for(Location::New, "cid1"),
            store.path_for(Location::Used, "cid1"),
        )
        .unwrap();

        let result = store.use_coupon("cid1").await;

        assert!(matches!(result, Err(StoreError::AlreadyUsed { .. })));
        assert!(!store.path_for(Location::New, "cid1").exists());
        assert!(store.path_for(Location::Used, "cid1").exists());
    }

    #[tokio::test]
    async fn test_invalid_ids_never_touch_the_disk() {
        let (store, temp) = create_temp_store().await;
        std::fs::write(temp.path().join("secret"), b"{}").unwrap();

        assert!(matches!(
            store.use_coupon("../secret").await,
            Err(StoreError::NotExist { .. })
        ));
        assert!(temp.path().join("secret").exists());
    }

    #[tokio::test]
    async fn test_list_skips_directories_and_dot_files() {
        let (store, temp) = create_temp_store().await;
        store.add(&Coupon::new("cid1", "v1", 100)).await.unwrap();
        std::fs::create_dir(temp.path().join("new").join("nested")).unwrap();
        std::fs::write(temp.path().join("new").join(".cid2.tmp"), b"partial").unwrap();

        let coupons = store.list().await.unwrap();

        assert_eq!(coupons, vec![Coupon::new("cid1", "v1", 100)]);
    }

    #[tokio::test]
    async fn test_listed_coupons_are_redeemable() {
        let (store, temp) = create_temp_store().await;
        let new_dir = temp.path().join("new");
        std::fs::write(new_dir.join("cid1"), Coupon::new("other", "v1", 100).to_record().unwrap()).unwrap();
        std::fs::write(new_dir.join("91+23"), Coupon::new("91+23", "v2", 50).to_record().unwrap()).unwrap();

        let listed = store.list().await.unwrap();

        assert_eq!(listed, vec![Coupon::new("cid1", "v1", 100)]);
        store.use_coupon(&listed[0].id).await.unwrap();
        assert!(store.path_for(Location::Used, "cid1").is_file());
    }

    #[tokio::test]
    async fn test_list_fails_on_malformed_record() {
        let (store, temp) = create_temp_store().await;
        std::fs::write(temp.path().join("new").join("broken"), b"not json").unwrap();

        let result = store.list().await;

        assert!(matches!(
            result,
            Err(StoreError::Unavailable(BackendError::Malformed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_reconcile_removes_only_ghosts() {
        let (store, temp) = create_temp_store().await;
        for id in ["a", "b", "c"] {
            store.add(&Coupon::new(id, "v", 10)).await.unwrap();
        }
        std::fs::copy(temp.path().join("new/b"), temp.path().join("used/b")).unwrap();

        assert_eq!(store.reconcile().await.unwrap(), 1);
        assert_eq!(store.reconcile().await.unwrap(), 0);

        let mut ids: Vec<String> = store.list().await.unwrap().into_iter().map(|c| c.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_root_is_unavailable() {
        let (store, temp) = create_temp_store().await;
        std::fs::remove_dir_all(temp.path().join("new")).unwrap();

        assert!(matches!(store.list().await, Err(StoreError::Unavailable(_))));
    }
}
