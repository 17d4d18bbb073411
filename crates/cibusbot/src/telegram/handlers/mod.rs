//! Telegram bot handler tree configuration
//!
//! The dispatcher schema lives here together with the store-facing halves of
//! the command handlers (`list_reply`, `use_reply`), which tests can call
//! without a Telegram connection.

mod commands;
mod schema;
mod types;

pub use commands::{list_reply, use_reply};
pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
