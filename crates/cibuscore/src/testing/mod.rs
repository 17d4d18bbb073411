//! Testing utilities for the coupon store
//!
//! - [`MemoryBucket`]: an in-process [`ObjectBucket`](crate::store::ObjectBucket)
//!   that can be told to fail copies or deletes, go offline or respond slowly,
//!   so the partial-failure rows of the transition table can be exercised
//!   without S3.
//! - [`fixtures`]: sample coupons.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use cibuscore::testing::MemoryBucket;
//! use cibuscore::ObjectCouponStore;
//!
//! let bucket = MemoryBucket::new();
//! bucket.fail_deletes(1);
//! let store = ObjectCouponStore::new(bucket, Duration::from_secs(1));
//! ```

pub mod fixtures;
pub mod memory;

pub use fixtures::{sample_coupons, scenario_coupon};
pub use memory::MemoryBucket;
