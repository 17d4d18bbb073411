//! Bot configuration read from the environment

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use cibuscore::core::config::{non_empty, parse_flag, parse_u64, ConfigError};
use secrecy::SecretString;
use url::Url;

/// Environment variable names
pub mod vars {
    pub const TG_BOT_TOKEN: &str = "TG_BOT_TOKEN";
    pub const ALLOWED_USER_IDS: &str = "ALLOWED_USER_IDS";
    pub const BOT_DEBUG: &str = "BOT_DEBUG";
    pub const BOT_API_URL: &str = "BOT_API_URL";
    pub const BOT_REQUEST_TIMEOUT_SECS: &str = "BOT_REQUEST_TIMEOUT_SECS";
}

/// Default values
pub mod defaults {
    /// HTTP timeout for Bot API requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;
}

/// Telegram side of the configuration
#[derive(Debug)]
pub struct BotConfig {
    pub token: SecretString,
    /// Telegram user ids allowed to talk to the bot
    pub allowed_user_ids: BTreeSet<u64>,
    /// Reply to unauthorized senders instead of dropping silently
    pub debug: bool,
    /// Custom (local) Bot API server
    pub api_url: Option<Url>,
    pub request_timeout: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = non_empty(&lookup, vars::TG_BOT_TOKEN).ok_or(ConfigError::Missing(vars::TG_BOT_TOKEN))?;

        let raw_ids = non_empty(&lookup, vars::ALLOWED_USER_IDS).ok_or(ConfigError::Missing(vars::ALLOWED_USER_IDS))?;
        let allowed_user_ids = parse_user_ids(&raw_ids);
        if allowed_user_ids.is_empty() {
            return Err(ConfigError::Invalid {
                var: vars::ALLOWED_USER_IDS,
                reason: format!("no valid user id in {:?}", raw_ids),
            });
        }

        let api_url = non_empty(&lookup, vars::BOT_API_URL)
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    var: vars::BOT_API_URL,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let request_timeout = Duration::from_secs(
            parse_u64(&lookup, vars::BOT_REQUEST_TIMEOUT_SECS)?.unwrap_or(defaults::REQUEST_TIMEOUT_SECS),
        );

        Ok(Self {
            token: SecretString::from(token),
            allowed_user_ids,
            debug: parse_flag(&lookup, vars::BOT_DEBUG),
            api_url,
            request_timeout,
        })
    }
}

/// Parses a comma/whitespace separated list of Telegram user ids.
///
/// Entries that are not numbers are logged and skipped.
pub fn parse_user_ids(raw: &str) -> BTreeSet<u64> {
    raw.split([',', ' ', '\n', '\t'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                log::warn!("Ignoring invalid user id {:?} in {}", part, vars::ALLOWED_USER_IDS);
                None
            }
        })
        .collect()
}
