//! dairydesk - command-line console for the dairy backend.
//!
//! Lists customers, products, deliveries, payments and orders with search
//! and filters, shows live stock levels, manages the local cart and runs
//! checkout with an interactive payment step.

mod commands;
mod prompt;
mod table;

use std::io;

use anyhow::Result;
use dairydesk_core::config::{Config, TOKEN_ENV};
use dairydesk_core::ApiClient;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of the daily rolling log file
const LOG_FILE_PREFIX: &str = "dairydesk.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, filtered by RUST_LOG (default "warn"). With
/// `log_to_file` set they also go to a daily rolling file in the data
/// directory; the returned guard must live until exit to flush it.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_to_file.then(|| config.data_dir()) {
        Some(Ok(dir)) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        Some(Err(e)) => {
            eprintln!("File logging disabled: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, commands::USAGE);
            std::process::exit(2);
        }
    };
    if matches!(command, Command::Help) {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let _log_guard = init_tracing(&config);
    info!(api = %config.api_base_url, "dairydesk starting");

    let mut client = ApiClient::new(&config)?;
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            client.set_token(token.trim().to_string());
        }
    }

    commands::run(command, &config, client).await
}
