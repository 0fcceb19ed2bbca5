//! Enumerations used throughout the client.
//!
//! The serde renames match the wire spellings Kraken uses in status and
//! subscription frames, so these enums deserialize straight from frame JSON.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of a WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Online,
    Closing,
    Closed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Online => write!(f, "online"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Channel lifecycle
// ---------------------------------------------------------------------------

/// Status of a subscription channel, as acknowledged by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    Subscribed,
    Unsubscribed,
}

// ---------------------------------------------------------------------------
// Subscription kinds
// ---------------------------------------------------------------------------

/// Channel kinds defined by the Kraken streaming protocol.
///
/// Only [`Book`](Self::Book) and [`Ticker`](Self::Ticker) are implemented;
/// requesting any other kind fails with `WsError::Unsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionKind {
    Book,
    Ticker,
    Ohlc,
    OpenOrders,
    OwnTrades,
    Spread,
    Trade,
}

impl std::fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Book => write!(f, "book"),
            Self::Ticker => write!(f, "ticker"),
            Self::Ohlc => write!(f, "ohlc"),
            Self::OpenOrders => write!(f, "openOrders"),
            Self::OwnTrades => write!(f, "ownTrades"),
            Self::Spread => write!(f, "spread"),
            Self::Trade => write!(f, "trade"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_kind_wire_spelling() {
        assert_eq!(serde_json::to_string(&SubscriptionKind::Book).unwrap(), "\"book\"");
        assert_eq!(
            serde_json::to_string(&SubscriptionKind::OpenOrders).unwrap(),
            "\"openOrders\""
        );
    }

    #[test]
    fn channel_status_from_wire() {
        let status: ChannelStatus = serde_json::from_str("\"subscribed\"").unwrap();
        assert_eq!(status, ChannelStatus::Subscribed);
    }
}
