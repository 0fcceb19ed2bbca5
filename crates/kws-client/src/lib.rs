//! # kws-client
//!
//! Market-data engine for the Kraken streaming protocol.
//!
//! ## Architecture
//!
//! A single public WebSocket connection is shared by all subscriptions. The
//! [`client::KrakenClient`] facade ensures the connection exists, sends
//! subscribe/unsubscribe requests built by [`request`], and runs one
//! background receive task that feeds every inbound frame through
//! [`decode::decode_frame`] into the [`state::FeedState`] reconciler.
//!
//! ## Modules
//!
//! - [`decode`] — frame classification and decoding into typed [`decode::Event`]s
//! - [`request`] — subscription request payloads
//! - [`state`] — channel/book/ticker reconciliation and change observers
//! - [`client`] — connection lifecycle and the public facade
//! - [`auth`] — REST request signing (stateless, unused by the stream engine)

pub mod auth;
pub mod client;
pub mod decode;
pub mod request;
pub mod state;

pub use client::KrakenClient;
pub use decode::Event;
pub use state::{BookCallback, TickerCallback};
