use std::env;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;

use cibusbot::cli::{Cli, Commands};
use cibusbot::telegram::replies::sort_for_list;
use cibusbot::telegram::{connect, create_bot, schema, setup_bot_commands, AllowList, HandlerDeps};
use cibusbot::BotConfig;
use cibuscore::core::config::vars;
use cibuscore::core::logging::parse_level;
use cibuscore::core::init_logger;
use cibuscore::core::retry::RetryConfig;
use cibuscore::{init_store, reconcile_store, CouponStore, StoreConfig};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, store, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from handler tasks instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    let level = parse_level(env::var(vars::LOG_LEVEL).ok().as_deref());
    let log_file_path = env::var(vars::LOG_FILE_PATH).ok().filter(|path| !path.trim().is_empty());
    init_logger(level, log_file_path.as_deref())?;

    let store_config = StoreConfig::from_env()?;

    match cli.command {
        Some(Commands::Run) => run_bot(&store_config).await,
        Some(Commands::List) => run_list(&store_config).await,
        Some(Commands::Reconcile) => run_reconcile(&store_config).await,
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot(&store_config).await
        }
    }
}

/// Print the new coupons, soonest expiration first
async fn run_list(store_config: &StoreConfig) -> Result<()> {
    let store = init_store(store_config).await?;
    let mut coupons = store.list().await?;
    sort_for_list(&mut coupons);

    if coupons.is_empty() {
        println!("No available coupons in {}", store_config.location());
    }
    for coupon in &coupons {
        println!("{}", coupon);
    }
    Ok(())
}

async fn run_reconcile(store_config: &StoreConfig) -> Result<()> {
    let healed = reconcile_store(store_config).await?;
    println!("Removed {} stale coupon(s) from {}", healed, store_config.location());
    Ok(())
}

async fn run_bot(store_config: &StoreConfig) -> Result<()> {
    log::info!("Starting cibusbot...");

    let bot_config = BotConfig::from_env()?;

    let store = init_store(store_config).await?;
    log::info!("Coupon store: {}", store.describe());

    let bot = create_bot(&bot_config)?;
    connect(&bot, &RetryConfig::startup()).await?;

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let allow_list = AllowList::new(bot_config.allowed_user_ids.iter().copied());
    log::info!("{} user(s) allowed, debug replies: {}", allow_list.len(), bot_config.debug);

    let deps = HandlerDeps::new(store, allow_list, bot_config.debug);

    Dispatcher::builder(bot, schema(deps))
        .default_handler(|update| async move {
            log::debug!("Unhandled update: {:?}", update.kind);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("An error has occurred in the dispatcher"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
