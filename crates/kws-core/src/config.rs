//! Configuration parsing for the runner binary.
//!
//! Settings come from a single JSON file describing which market-data
//! channels to subscribe on startup.
//!
//! # Example config
//!
//! ```json
//! {
//!   "client_name": "kraken-feed",
//!   "uri": "wss://ws.kraken.com",
//!   "book_pairs": ["ETH/BTC", "NANO/ETH"],
//!   "book_depth": 10,
//!   "ticker_pairs": ["ETH/BTC"],
//!   "log_path": "/tmp/kws"
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::SOCKET_PUBLIC;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Client name, used in log output.
    pub client_name: Option<String>,

    /// Public WebSocket endpoint override.
    pub uri: Option<String>,

    /// Pairs to subscribe order books for (e.g. `"ETH/BTC"`).
    #[serde(default)]
    pub book_pairs: Vec<String>,

    /// Book depth per side (10, 25, 100, 500, 1000).
    pub book_depth: Option<u32>,

    /// Pairs to subscribe ticker updates for.
    #[serde(default)]
    pub ticker_pairs: Vec<String>,

    /// Optional directory for daily-rotating log files.
    pub log_path: Option<String>,
}

impl AppConfig {
    /// Effective WebSocket endpoint: the override, or the public endpoint.
    pub fn endpoint(&self) -> &str {
        self.uri.as_deref().unwrap_or(SOCKET_PUBLIC)
    }

    /// Effective book depth, defaulting to 10 levels per side.
    pub fn depth(&self) -> u32 {
        self.book_depth.unwrap_or(10)
    }
}

/// Load and parse the JSON config file at `path`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}
