//! Logger initialization
//!
//! Console output always, plus an optional log file.

use std::fs::File;

use anyhow::Result;
use simplelog::*;

/// Parses a `LOG_LEVEL` value, falling back to `Info` for anything unknown.
pub fn parse_level(raw: Option<&str>) -> LevelFilter {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") | Some("warning") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Logger config shared by both sinks.
///
/// The AWS SDK and the HTTP stack log every request at debug level; they are
/// kept out so `LOG_LEVEL=debug` shows the store's own decisions.
fn logger_config() -> Config {
    ConfigBuilder::new()
        .add_filter_ignore_str("aws_")
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("rustls")
        .add_filter_ignore_str("h2")
        .build()
}

/// Initialize logger for console and, if given, file output
///
/// # Arguments
/// * `level` - Maximum level for both sinks
/// * `log_file_path` - Optional path to an extra log file (truncated on start)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Log file could not be created or a logger was already set
pub fn init_logger(level: LevelFilter, log_file_path: Option<&str>) -> Result<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        logger_config(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file_path {
        let log_file = File::create(path).map_err(|e| anyhow::anyhow!("Failed to create log file {}: {}", path, e))?;
        loggers.push(WriteLogger::new(level, logger_config(), log_file));
    }

    CombinedLogger::init(loggers).map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}
