//! Telegram bot integration and handlers

pub mod access;
pub mod barcode;
pub mod bot;
pub mod handlers;
pub mod replies;

// Re-exports for convenience
pub use access::AllowList;
pub use bot::{connect, create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
