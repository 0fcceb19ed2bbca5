//! # kws-core
//!
//! Core crate for the Kraken WebSocket market-data client, providing:
//!
//! - **Types** (`types`) — enums, book/ticker structs, channel and connection entities
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `WsError` via thiserror
//! - **WebSocket** (`ws`) — transport traits + tokio-tungstenite implementation
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod ws;

pub use error::WsError;
// Re-export types at crate root for convenience.
pub use types::*;

/// Kraken public (unauthenticated) WebSocket endpoint.
pub const SOCKET_PUBLIC: &str = "wss://ws.kraken.com";

/// Kraken private (token-authenticated) WebSocket endpoint.
pub const SOCKET_PRIVATE: &str = "wss://ws-auth.kraken.com";
