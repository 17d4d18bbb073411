//! Cibus bot - Telegram front end of the coupon store
//!
//! # Module Structure
//!
//! - `cli`: command line interface
//! - `config`: bot configuration (token, allow-list, Bot API settings)
//! - `telegram`: bot creation, dispatcher schema, handlers, replies, barcodes

pub mod cli;
pub mod config;
pub mod telegram;

pub use config::BotConfig;
