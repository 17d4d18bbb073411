//! Cibus core - coupon model and the new/used coupon store
//!
//! This crate has no Telegram dependency. It provides the coupon entity, the
//! `CouponStore` contract with its filesystem and object-store backends, and
//! the ambient pieces the bot binary builds on (configuration, errors,
//! logging, retry).
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and retry helpers
//! - `coupon`: the coupon entity and its display helpers
//! - `store`: the store contract, the transition table and the backends
//! - `testing`: in-memory bucket with fault injection, fixtures

pub mod core;
pub mod coupon;
pub mod store;
pub mod testing;

// Re-export commonly used types for convenience
pub use core::{BackendError, StoreConfig, StoreError, StoreResult};
pub use coupon::Coupon;
pub use store::{init_store, reconcile_store, CouponStore, FilesystemStore, Location, ObjectBucket, ObjectCouponStore};
