//! Command flows against real stores, without a Telegram connection
//!
//! `list_reply` and `use_reply` are the store-facing halves of the `/list`
//! and `/use` handlers; these tests drive them through the same scenarios a
//! user would.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use cibusbot::telegram::handlers::{list_reply, use_reply};
use cibusbot::telegram::replies::{self, ListReply, UseReply};
use cibusbot::telegram::Command;
use cibuscore::core::retry::RetryConfig;
use cibuscore::testing::{sample_coupons, scenario_coupon, MemoryBucket};
use cibuscore::{CouponStore, FilesystemStore, ObjectCouponStore};
use teloxide::utils::command::BotCommands;

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .max_retries(2)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .no_jitter()
}

async fn filesystem_store() -> (Arc<FilesystemStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(temp_dir.path(), TIMEOUT).await.unwrap();
    (Arc::new(store), temp_dir)
}

/// Coupon id the bot would redeem for `text`
fn command_id(text: &str) -> String {
    match Command::parse(text, "cibus_bot").unwrap() {
        Command::Use(id) => id,
        other => panic!("expected /use, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_then_tap_button_then_use_again() {
    let (store, _temp) = filesystem_store().await;
    store.add(&scenario_coupon()).await.unwrap();
    let dyn_store: Arc<dyn CouponStore> = store.clone();

    let ListReply::Coupons(coupons) = list_reply(&dyn_store, &fast_retry()).await else {
        panic!("expected coupons");
    };
    assert_eq!(coupons, vec![scenario_coupon()]);

    // The keyboard button text comes back as the next message
    let button = replies::button_label(&coupons[0]);
    let id = command_id(&button);

    assert_eq!(
        use_reply(store.as_ref(), &id).await,
        UseReply::Barcode {
            id: "cid1".to_string(),
            caption: "Using cid1".to_string(),
        }
    );
    assert_eq!(
        use_reply(store.as_ref(), &id).await,
        UseReply::Text(replies::ALREADY_USED)
    );
    assert_eq!(
        list_reply(&dyn_store, &fast_retry()).await,
        ListReply::Text(replies::NO_COUPONS)
    );
}

#[tokio::test]
async fn test_use_without_id_asks_for_one() {
    let (store, _temp) = filesystem_store().await;

    let id = command_id("/use");

    assert_eq!(use_reply(store.as_ref(), &id).await, UseReply::Text(replies::SPECIFY_COUPON));
}

#[tokio::test]
async fn test_use_of_unknown_coupon() {
    let (store, _temp) = filesystem_store().await;

    assert_eq!(
        use_reply(store.as_ref(), &command_id("/use 000000")).await,
        UseReply::Text(replies::NO_SUCH_COUPON)
    );
    assert_eq!(
        use_reply(store.as_ref(), &command_id("/use ../../etc/passwd")).await,
        UseReply::Text(replies::NO_SUCH_COUPON)
    );
}

#[tokio::test]
async fn test_list_is_sorted_by_expiration() {
    let store = Arc::new(ObjectCouponStore::new(MemoryBucket::new(), TIMEOUT));
    for coupon in sample_coupons() {
        store.add(&coupon).await.unwrap();
    }
    let dyn_store: Arc<dyn CouponStore> = store;

    let ListReply::Coupons(coupons) = list_reply(&dyn_store, &fast_retry()).await else {
        panic!("expected coupons");
    };

    let ids: Vec<&str> = coupons.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["912300002", "912300001", "912300003"]);
}

#[tokio::test]
async fn test_list_of_offline_store_says_try_again() {
    let store = Arc::new(ObjectCouponStore::new(MemoryBucket::new(), TIMEOUT));
    store.add(&scenario_coupon()).await.unwrap();
    store.bucket().set_offline(true);
    let dyn_store: Arc<dyn CouponStore> = store;

    assert_eq!(
        list_reply(&dyn_store, &fast_retry()).await,
        ListReply::Text(replies::TRY_AGAIN)
    );
}

#[tokio::test]
async fn test_use_with_failed_copy_says_try_again_and_keeps_coupon() {
    let store = Arc::new(ObjectCouponStore::new(MemoryBucket::new(), TIMEOUT));
    store.add(&scenario_coupon()).await.unwrap();
    store.bucket().fail_copies(1);

    assert_eq!(use_reply(store.as_ref(), "cid1").await, UseReply::Text(replies::TRY_AGAIN));
    assert!(store.bucket().contains("new/cid1"));

    // Not retried behind the user's back
    assert_eq!(store.bucket().copies(), 1);

    assert!(matches!(use_reply(store.as_ref(), "cid1").await, UseReply::Barcode { .. }));
}

#[tokio::test]
async fn test_use_with_failed_delete_still_hands_out_barcode() {
    let store = Arc::new(ObjectCouponStore::new(MemoryBucket::new(), TIMEOUT));
    store.add(&scenario_coupon()).await.unwrap();
    store.bucket().fail_deletes(1);

    assert!(matches!(use_reply(store.as_ref(), "cid1").await, UseReply::Barcode { .. }));
    assert_eq!(use_reply(store.as_ref(), "cid1").await, UseReply::Text(replies::ALREADY_USED));
    assert!(!store.bucket().contains("new/cid1"));
}
