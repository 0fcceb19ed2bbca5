//! Session entities — subscriptions, channels, and connection metadata.

use serde::{Deserialize, Deserializer, Serialize};

use super::enums::{ChannelStatus, ConnectionStatus, SubscriptionKind};

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Parameters of one subscription, as sent in requests and echoed in channel
/// acknowledgements. Unset optionals are omitted when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub name: SubscriptionKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub interval: Option<u32>,
}

impl Subscription {
    pub fn new(name: SubscriptionKind) -> Self {
        Self { name, token: None, depth: None, interval: None }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A subscription channel tracked from a `subscriptionStatus` acknowledgement.
///
/// Keyed by `channel_id` once assigned by the server; at most one channel per
/// `(pair, subscription kind)` is in subscribed status at a time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(rename = "channelID")]
    pub channel_id: i64,
    pub channel_name: String,
    pub event: String,
    pub status: ChannelStatus,
    #[serde(default)]
    pub pair: String,
    pub subscription: Subscription,
}

// ---------------------------------------------------------------------------
// Connection metadata
// ---------------------------------------------------------------------------

/// The handshake/status frame a connection opens with.
///
/// The live protocol sends `connectionID` as a JSON number even though the
/// documented shape is a string; both are accepted and normalized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionInfo {
    #[serde(rename = "connectionID", deserialize_with = "string_or_number")]
    pub connection_id: String,
    pub event: String,
    pub status: ConnectionStatus,
    pub version: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "connectionID must be a string or number, got {other}"
        ))),
    }
}
