//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Start-up connection check

use std::fmt;

use cibuscore::core::retry::{retry, RetryConfig, Retryable};
use reqwest::ClientBuilder;
use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, Me};
use teloxide::utils::command::{BotCommands, ParseError};
use teloxide::RequestError;

use super::replies::coupon_arg;
use crate::config::BotConfig;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "list available coupons")]
    List,
    #[command(description = "use a coupon: /use <coupon-id>", parse_with = parse_use_args)]
    Use(String),
}

/// Keeps only the coupon id of `/use` arguments; an empty string means none was given.
fn parse_use_args(input: String) -> Result<(String,), ParseError> {
    Ok((coupon_arg(&input).unwrap_or_default().to_string(),))
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - HTTP client could not be built
pub fn create_bot(config: &BotConfig) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config.request_timeout).build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    let bot = match &config.api_url {
        Some(url) => {
            log::info!("Using custom Bot API URL: {}", url);
            bot.set_api_url(url.clone())
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("list", "list available coupons"),
        BotCommand::new("use", "use a coupon: /use <coupon-id>"),
    ])
    .await?;

    Ok(())
}

/// Start-up request failure, retried while the Bot API is unreachable.
#[derive(Debug)]
pub struct StartupError(pub RequestError);

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for StartupError {}

impl Retryable for StartupError {
    fn is_retryable(&self) -> bool {
        matches!(
            self.0,
            RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
        )
    }
}

/// Fetches the bot's own account, retrying while the Bot API is not reachable.
///
/// An invalid token fails on the first attempt.
pub async fn connect(bot: &Bot, config: &RetryConfig) -> anyhow::Result<Me> {
    let outcome = retry(config, || {
        let bot = bot.clone();
        async move { bot.get_me().await.map_err(StartupError) }
    })
    .await;

    let attempts = outcome.attempts;
    let me = outcome
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to connect to Bot API after {} attempt(s): {}", attempts, e))?;

    log::info!("Authorized on bot @{} (ID: {})", me.username(), me.id);
    Ok(me)
}
