//! In-memory object bucket with fault injection

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::BackendError;
use crate::store::ObjectBucket;

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    offline: bool,
    failing_copies: usize,
    lost_copy_responses: usize,
    failing_deletes: usize,
    copies: usize,
    deletes: usize,
}

/// [`ObjectBucket`] backed by a sorted map.
///
/// Faults are armed per call: `fail_copies(2)` makes the next two `copy`
/// calls fail without touching the map, `lose_copy_responses(1)` makes the
/// next copy land and still report failure.
#[derive(Default)]
pub struct MemoryBucket {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before acting.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Checks the offline switch and returns the locked state.
    async fn reach(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        self.delay().await;
        let state = self.state();
        if state.offline {
            return Err(BackendError::ObjectStore("bucket is offline".to_string()));
        }
        Ok(state)
    }

    /// Makes the next `n` copies fail.
    pub fn fail_copies(&self, n: usize) {
        self.state().failing_copies = n;
    }

    /// Makes the next `n` copies apply and then fail, like a lost response.
    pub fn lose_copy_responses(&self, n: usize) {
        self.state().lost_copy_responses = n;
    }

    /// Makes the next `n` deletes fail.
    pub fn fail_deletes(&self, n: usize) {
        self.state().failing_deletes = n;
    }

    /// While offline every call fails.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Stores `body` under `key` directly, bypassing faults.
    pub fn insert_raw(&self, key: impl Into<String>, body: Vec<u8>) {
        self.state().objects.insert(key.into(), body);
    }

    /// Copies `from` to `to` directly, bypassing faults. No-op if `from` is missing.
    pub fn copy_raw(&self, from: &str, to: &str) {
        let mut state = self.state();
        if let Some(body) = state.objects.get(from).cloned() {
            state.objects.insert(to.to_string(), body);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state()
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of `copy` calls received.
    pub fn copies(&self) -> usize {
        self.state().copies
    }

    /// Number of `delete` calls received.
    pub fn deletes(&self) -> usize {
        self.state().deletes
    }
}

#[async_trait]
impl ObjectBucket for MemoryBucket {
    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.reach().await?.objects.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.reach().await?.objects.get(key).cloned())
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), BackendError> {
        self.reach().await?.objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), BackendError> {
        let mut state = self.reach().await?;
        state.copies += 1;
        if state.failing_copies > 0 {
            state.failing_copies -= 1;
            return Err(BackendError::ObjectStore(format!("injected copy failure for {}", from)));
        }
        let body = state
            .objects
            .get(from)
            .cloned()
            .ok_or_else(|| BackendError::ObjectStore(format!("NoSuchKey: {}", from)))?;
        state.objects.insert(to.to_string(), body);
        if state.lost_copy_responses > 0 {
            state.lost_copy_responses -= 1;
            return Err(BackendError::ObjectStore(format!("response lost after copying {}", from)));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut state = self.reach().await?;
        state.deletes += 1;
        if state.failing_deletes > 0 {
            state.failing_deletes -= 1;
            return Err(BackendError::ObjectStore(format!("injected delete failure for {}", key)));
        }
        state.objects.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let state = self.reach().await?;
        Ok(state
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
