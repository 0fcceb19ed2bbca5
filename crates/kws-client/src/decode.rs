//! Frame classification and decoding.
//!
//! Kraken frames carry no envelope type tag; the shape itself is the signal.
//! Discrimination runs in a fixed order:
//!
//! 1. Not valid JSON → [`WsError::Decode`] carrying the frame text.
//! 2. Object with a `connectionID` key → connection-status event.
//! 3. Object with a `channelID` key → channel-status event.
//! 4. Any other object (heartbeat, system status) → [`Event::Ignored`].
//! 5. Array `[id, payload, .., channelName, pair]`: channel name `ticker`
//!    → ticker update; payload with `as`/`bs` → book snapshot; payload with
//!    `a`/`b` → book diff; anything else → [`WsError::BookData`].
//!
//! Array payloads are walked manually as `serde_json::Value`; keyed frames
//! deserialize into their entity structs.

use rust_decimal::Decimal;
use serde_json::Value;

use kws_core::{Channel, ConnectionInfo, OrderBook, PriceLevel, Ticker, TickerData, WsError};

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConnectionStatus(ConnectionInfo),
    ChannelStatus(Channel),
    BookSnapshot(OrderBook),
    BookDiff(BookDiff),
    TickerUpdate(Ticker),
    /// Recognized protocol noise (heartbeats, status frames without IDs).
    Ignored,
}

/// An incremental book update naming only changed price levels.
///
/// Diff frames do not repeat the channel ID reliably, so the target book is
/// identified by `(channel_name, pair)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BookDiff {
    pub channel_name: String,
    pub pair: String,
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
    /// CRC32 checksum of the top levels, when the exchange sends one.
    pub checksum: Option<String>,
}

/// Decode one raw text frame into exactly one [`Event`].
pub fn decode_frame(text: &str) -> Result<Event, WsError> {
    let value: Value =
        serde_json::from_str(text).map_err(|_| WsError::Decode(text.to_owned()))?;
    match value {
        Value::Array(items) => decode_array_frame(&items),
        Value::Object(_) => decode_object_frame(value),
        _ => Ok(Event::Ignored),
    }
}

// ---------------------------------------------------------------------------
// Keyed frames
// ---------------------------------------------------------------------------

fn decode_object_frame(value: Value) -> Result<Event, WsError> {
    if value.get("connectionID").is_some() {
        let info: ConnectionInfo = serde_json::from_value(value.clone())
            .map_err(|_| WsError::Decode(value.to_string()))?;
        return Ok(Event::ConnectionStatus(info));
    }
    if value.get("channelID").is_some() {
        let channel: Channel = serde_json::from_value(value.clone())
            .map_err(|_| WsError::Decode(value.to_string()))?;
        return Ok(Event::ChannelStatus(channel));
    }
    Ok(Event::Ignored)
}

// ---------------------------------------------------------------------------
// Array frames
// ---------------------------------------------------------------------------

fn decode_array_frame(items: &[Value]) -> Result<Event, WsError> {
    if items.len() < 4 {
        return Err(WsError::BookData(render(items)));
    }
    let channel_name = items[items.len() - 2]
        .as_str()
        .ok_or_else(|| WsError::BookData(render(items)))?
        .to_owned();
    let pair = items[items.len() - 1]
        .as_str()
        .ok_or_else(|| WsError::BookData(render(items)))?
        .to_owned();

    if channel_name == "ticker" {
        return decode_ticker(items, channel_name, pair);
    }
    decode_book(items, channel_name, pair)
}

fn decode_book(items: &[Value], channel_name: String, pair: String) -> Result<Event, WsError> {
    let payload = &items[1..items.len() - 2];

    // Snapshot: full ladder under `as`/`bs`.
    if let Some(first) = payload.first().and_then(Value::as_object) {
        if first.contains_key("as") || first.contains_key("bs") {
            let book = OrderBook {
                channel_id: items[0].as_i64(),
                channel_name,
                pair,
                asks: decode_levels(first.get("as"), items)?,
                bids: decode_levels(first.get("bs"), items)?,
            };
            return Ok(Event::BookSnapshot(book));
        }
    }

    // Diff: changed levels under `a`/`b`. The exchange may split ask and bid
    // updates into separate payload objects within one frame.
    let mut asks = Vec::new();
    let mut bids = Vec::new();
    let mut checksum = None;
    let mut matched = false;
    for part in payload {
        let Some(obj) = part.as_object() else { continue };
        if let Some(raw) = obj.get("a") {
            asks.extend(decode_levels(Some(raw), items)?);
            matched = true;
        }
        if let Some(raw) = obj.get("b") {
            bids.extend(decode_levels(Some(raw), items)?);
            matched = true;
        }
        if let Some(c) = obj.get("c").and_then(Value::as_str) {
            checksum = Some(c.to_owned());
        }
    }
    if !matched {
        return Err(WsError::BookData(render(items)));
    }
    Ok(Event::BookDiff(BookDiff { channel_name, pair, asks, bids, checksum }))
}

/// Decode a side's `[[price, volume, timestamp, ..], ..]` entries.
///
/// A missing side key yields an empty side. Republished levels carry a 4th
/// `"r"` marker element, which is ignored.
fn decode_levels(value: Option<&Value>, frame: &[Value]) -> Result<Vec<PriceLevel>, WsError> {
    let Some(value) = value else { return Ok(Vec::new()) };
    let entries = value.as_array().ok_or_else(|| WsError::BookData(render(frame)))?;
    entries
        .iter()
        .map(|entry| {
            let triple = entry
                .as_array()
                .filter(|a| a.len() >= 3)
                .ok_or_else(|| WsError::BookData(render(frame)))?;
            Ok(PriceLevel {
                price: as_decimal(&triple[0]).ok_or_else(|| WsError::BookData(render(frame)))?,
                volume: as_decimal(&triple[1]).ok_or_else(|| WsError::BookData(render(frame)))?,
                timestamp: as_decimal(&triple[2])
                    .ok_or_else(|| WsError::BookData(render(frame)))?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Ticker frames
// ---------------------------------------------------------------------------

fn decode_ticker(items: &[Value], channel_name: String, pair: String) -> Result<Event, WsError> {
    let fail = || WsError::Decode(render(items));
    let channel_id = items[0].as_i64().ok_or_else(fail)?;
    let obj = items[1].as_object().ok_or_else(fail)?;

    let data = TickerData {
        ask: decode_quote(obj.get("a")).ok_or_else(fail)?,
        bid: decode_quote(obj.get("b")).ok_or_else(fail)?,
        close: decode_decimal_pair(obj.get("c")).ok_or_else(fail)?,
        volume: decode_decimal_pair(obj.get("v")).ok_or_else(fail)?,
        average_price: decode_decimal_pair(obj.get("p")).ok_or_else(fail)?,
        trades: decode_count_pair(obj.get("t")).ok_or_else(fail)?,
        low_price: decode_decimal_pair(obj.get("l")).ok_or_else(fail)?,
        high_price: decode_decimal_pair(obj.get("h")).ok_or_else(fail)?,
        open_price: decode_decimal_pair(obj.get("o")).ok_or_else(fail)?,
    };
    Ok(Event::TickerUpdate(Ticker { channel_id, channel_name, pair, data }))
}

/// `[price, wholeLotVolume, lotVolume]`.
fn decode_quote(value: Option<&Value>) -> Option<(Decimal, i64, Decimal)> {
    let arr = value?.as_array()?;
    Some((as_decimal(arr.first()?)?, arr.get(1)?.as_i64()?, as_decimal(arr.get(2)?)?))
}

/// `[today, last24h]` decimal pair.
fn decode_decimal_pair(value: Option<&Value>) -> Option<(Decimal, Decimal)> {
    let arr = value?.as_array()?;
    Some((as_decimal(arr.first()?)?, as_decimal(arr.get(1)?)?))
}

/// `[today, last24h]` trade-count pair.
fn decode_count_pair(value: Option<&Value>) -> Option<(i64, i64)> {
    let arr = value?.as_array()?;
    Some((arr.first()?.as_i64()?, arr.get(1)?.as_i64()?))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a JSON value (string or number) as an exact decimal.
fn as_decimal(value: &Value) -> Option<Decimal> {
    if let Some(s) = value.as_str() {
        s.parse().ok()
    } else {
        value.to_string().parse().ok()
    }
}

fn render(items: &[Value]) -> String {
    Value::Array(items.to_vec()).to_string()
}
