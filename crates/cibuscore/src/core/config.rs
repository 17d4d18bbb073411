//! Store configuration read from the environment
//!
//! Values are resolved through a lookup function so the same parsing runs
//! against `std::env` in production and against a plain map in tests.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Environment variable names
pub mod vars {
    pub const COUPONS_BACKEND: &str = "COUPONS_BACKEND";
    pub const COUPONS_BUCKET: &str = "COUPONS_BUCKET";
    pub const COUPONS_DIR: &str = "COUPONS_DIR";
    pub const COUPONS_S3_ENDPOINT: &str = "COUPONS_S3_ENDPOINT";
    pub const COUPONS_S3_REGION: &str = "COUPONS_S3_REGION";
    pub const STORE_TIMEOUT_SECS: &str = "STORE_TIMEOUT_SECS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FILE_PATH: &str = "LOG_FILE_PATH";
}

/// Default values
pub mod defaults {
    use std::time::Duration;

    /// Local-testing coupons directory
    pub const COUPONS_DIR: &str = "/tmp/coupons";

    /// Bound on every single backend call (in seconds)
    pub const STORE_TIMEOUT_SECS: u64 = 10;

    pub fn store_timeout() -> Duration {
        Duration::from_secs(STORE_TIMEOUT_SECS)
    }
}

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required env var {0:?} wasn't found")]
    Missing(&'static str),

    #[error("invalid value for env var {var:?}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Which storage backend holds the coupons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Local directory, for testing
    Filesystem,
    /// S3 bucket
    #[default]
    S3,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(BackendKind::S3),
            "filesystem" | "fs" | "local" => Ok(BackendKind::Filesystem),
            other => Err(format!("unknown backend {:?} (expected s3 or filesystem)", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Filesystem => write!(f, "filesystem"),
            BackendKind::S3 => write!(f, "s3"),
        }
    }
}

/// Coupon store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Root directory of the filesystem backend
    pub coupons_dir: PathBuf,
    /// Bucket of the S3 backend
    pub bucket: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, localstack)
    pub s3_endpoint: Option<String>,
    /// Region override; otherwise the AWS default chain (AWS_REGION) applies
    pub s3_region: Option<String>,
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            coupons_dir: PathBuf::from(defaults::COUPONS_DIR),
            bucket: None,
            s3_endpoint: None,
            s3_region: None,
            timeout: defaults::store_timeout(),
        }
    }
}

impl StoreConfig {
    /// Filesystem configuration rooted at `dir`.
    pub fn filesystem(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Filesystem,
            coupons_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match non_empty(&lookup, vars::COUPONS_BACKEND) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: vars::COUPONS_BACKEND,
                reason,
            })?,
            None => BackendKind::default(),
        };

        let bucket = non_empty(&lookup, vars::COUPONS_BUCKET);
        if backend == BackendKind::S3 && bucket.is_none() {
            return Err(ConfigError::Missing(vars::COUPONS_BUCKET));
        }

        let timeout = match parse_u64(&lookup, vars::STORE_TIMEOUT_SECS)? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    var: vars::STORE_TIMEOUT_SECS,
                    reason: "must be greater than zero".to_string(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults::store_timeout(),
        };

        Ok(Self {
            backend,
            coupons_dir: non_empty(&lookup, vars::COUPONS_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(defaults::COUPONS_DIR)),
            bucket,
            s3_endpoint: non_empty(&lookup, vars::COUPONS_S3_ENDPOINT),
            s3_region: non_empty(&lookup, vars::COUPONS_S3_REGION),
            timeout,
        })
    }

    /// Human readable backend location for startup logs.
    pub fn location(&self) -> String {
        match self.backend {
            BackendKind::Filesystem => self.coupons_dir.display().to_string(),
            BackendKind::S3 => format!("s3://{}", self.bucket.as_deref().unwrap_or("<unset>")),
        }
    }
}

/// Trimmed value of `name`, `None` when unset or blank.
pub fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Parses `name` as an unsigned integer if it is set.
pub fn parse_u64<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name)
        .map(|raw| {
            raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Parses `name` as a boolean flag (`1/true/yes/on`), defaulting to false.
pub fn parse_flag<F>(lookup: &F, name: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name)
        .map(|raw| matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
