//! # kws-runner
//!
//! Main entry point for the Kraken market-data client.
//!
//! Loads a JSON configuration file, subscribes the configured order-book and
//! ticker channels, and streams updates to the log until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! kws-runner config.json --log-level info
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use kws_client::KrakenClient;

/// Kraken WebSocket Market Data Runner.
#[derive(Parser)]
#[command(name = "kws-runner", about = "Kraken WebSocket Market Data Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    kws_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "kws-runner");

    info!("kws-runner starting — config={}", cli.config.display());

    // 2. Load configuration
    let config = kws_core::config::load_config(&cli.config)?;
    let client_name = config.client_name.clone().unwrap_or_else(|| "KrakenWS".into());
    info!(
        "{client_name}: endpoint={} books={:?} tickers={:?}",
        config.endpoint(),
        config.book_pairs,
        config.ticker_pairs,
    );

    // 3. Connect and subscribe the configured channels
    let client = KrakenClient::new(
        std::sync::Arc::new(kws_core::ws::TlsConnector),
        config.endpoint(),
    );
    client.connect().await?;

    for pair in &config.book_pairs {
        client
            .subscribe_order_book(pair, config.depth(), |book| {
                info!(
                    "book {}: {} asks / {} bids",
                    book.pair,
                    book.asks.len(),
                    book.bids.len(),
                );
            })
            .await?;
        info!("subscribed book: {pair}");
    }

    for pair in &config.ticker_pairs {
        client
            .subscribe_ticker(pair, |ticker| {
                info!(
                    "ticker {}: ask={} bid={} last={}",
                    ticker.pair, ticker.data.ask.0, ticker.data.bid.0, ticker.data.close.0,
                );
            })
            .await?;
        info!("subscribed ticker: {pair}");
    }

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 5. Unsubscribe and close the connection gracefully
    if let Err(e) = client.shutdown().await {
        warn!("error during shutdown: {e}");
    }

    info!("all connections closed — goodbye");
    Ok(())
}
