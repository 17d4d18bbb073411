//! The coupon entity
//!
//! A coupon is stored as one JSON record keyed by its id:
//!
//! ```text
//! {"id": "912345678", "vendor": "Shufersal-Vardia", "value": 40, "expiration": 1767139200}
//! ```
//!
//! `expiration` is Unix seconds and may be absent.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum accepted coupon id length (bytes)
pub const MAX_ID_LEN: usize = 128;

/// A single-use Cibus coupon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Unique identifier, also the storage key
    pub id: String,
    /// Shop the coupon can be used at
    pub vendor: String,
    /// Amount of money in the coupon (ILS)
    pub value: u32,
    /// When the coupon expires, if known
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn new(id: impl Into<String>, vendor: impl Into<String>, value: u32) -> Self {
        Self {
            id: id.into(),
            vendor: vendor.into(),
            value,
            expiration: None,
        }
    }

    #[must_use]
    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Serialized record as stored by the backends.
    pub fn to_record(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_record(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl fmt::Display for Coupon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}ILS | {}", self.id, self.value, self.vendor)?;
        if let Some(expiration) = self.expiration {
            write!(f, " | exp {}", expiration.format("%Y-%m-%d"))?;
        }
        Ok(())
    }
}

/// Puts a dash after every 4 chars of the coupon id to make it readable.
pub fn readable_id(id: &str) -> String {
    let mut readable = String::with_capacity(id.len() + id.len() / 4);
    for (i, c) in id.chars().enumerate() {
        if i != 0 && i % 4 == 0 {
            readable.push('-');
        }
        readable.push(c);
    }
    readable
}

/// Whether `id` can name a stored coupon.
///
/// Ids end up as file names and object keys, so anything that could leave
/// the "new"/"used" namespaces is refused up front.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && !id.starts_with('.')
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
