//! Typed error definitions for the Kraken WebSocket client.
//!
//! Provides [`WsError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.
//!
//! Frame-level errors (`Decode`, `BookData`) are contained at the receive-loop
//! boundary: the offending frame is logged and dropped, the stream continues.
//! `Connection`, `Argument`, and `Unsupported` propagate to the caller.

use thiserror::Error;

use crate::types::SubscriptionKind;

/// Domain-specific errors for the Kraken WebSocket client.
#[derive(Debug, Error)]
pub enum WsError {
    /// Frame was not valid JSON. Carries the offending frame text.
    #[error("invalid json frame: {0}")]
    Decode(String),

    /// Array frame whose inner object matches neither the snapshot nor the
    /// diff shape.
    #[error("unhandled book payload: {0}")]
    BookData(String),

    /// WebSocket open or handshake failure. Fatal to the connect attempt.
    #[error("websocket connection failed: {0}")]
    Connection(String),

    /// Caller omitted a required subscription parameter. Raised before any
    /// network I/O.
    #[error("missing required parameter: {0}")]
    Argument(&'static str),

    /// Subscription kind recognized by the protocol but not implemented.
    #[error("subscription kind not supported: {0}")]
    Unsupported(SubscriptionKind),

    /// Transport-level send/close failure on an established connection.
    #[error("websocket transport error: {0}")]
    Transport(String),

    /// REST request signing failure (bad secret encoding).
    #[error("signing error: {0}")]
    Sign(String),
}
