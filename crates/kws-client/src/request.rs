//! Subscription request payloads.
//!
//! A pure mapping from `(subscription kind, parameters)` to the outbound
//! request object. Parameter validation happens here, before any network
//! I/O: a missing `pair` or `depth` is a caller contract violation, not a
//! runtime condition.

use serde::Serialize;

use kws_core::{Subscription, SubscriptionKind, WsError};

/// `event` field of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestEvent {
    Subscribe,
    Unsubscribe,
}

/// Outbound subscribe/unsubscribe payload.
///
/// Serializes exactly to the wire shape, e.g.
/// `{"event":"subscribe","subscription":{"name":"book","depth":10},"pair":["ETH/BTC"]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionRequest {
    pub event: RequestEvent,
    pub subscription: Subscription,
    pub pair: Vec<String>,
}

/// Caller-supplied parameters for [`build`].
#[derive(Debug, Clone, Default)]
pub struct SubscriptionParams {
    pub pair: Option<String>,
    pub subscribe: bool,
    pub depth: Option<u32>,
}

impl SubscriptionParams {
    pub fn subscribe(pair: &str) -> Self {
        Self { pair: Some(pair.to_owned()), subscribe: true, depth: None }
    }

    pub fn unsubscribe(pair: &str) -> Self {
        Self { pair: Some(pair.to_owned()), subscribe: false, depth: None }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Build the request payload for one subscription kind.
///
/// Exhaustive over [`SubscriptionKind`]; kinds the protocol defines but this
/// client does not implement fail with [`WsError::Unsupported`] rather than
/// silently no-op.
pub fn build(
    kind: SubscriptionKind,
    params: &SubscriptionParams,
) -> Result<SubscriptionRequest, WsError> {
    match kind {
        SubscriptionKind::Book => build_book(params),
        SubscriptionKind::Ticker => build_ticker(params),
        SubscriptionKind::Ohlc
        | SubscriptionKind::OpenOrders
        | SubscriptionKind::OwnTrades
        | SubscriptionKind::Spread
        | SubscriptionKind::Trade => Err(WsError::Unsupported(kind)),
    }
}

/// Book requests require `pair`; `depth` only when subscribing (unsubscribe
/// payloads omit it).
fn build_book(params: &SubscriptionParams) -> Result<SubscriptionRequest, WsError> {
    let pair = params.pair.as_deref().ok_or(WsError::Argument("pair"))?;
    let depth = if params.subscribe {
        Some(params.depth.ok_or(WsError::Argument("depth"))?)
    } else {
        None
    };
    Ok(SubscriptionRequest {
        event: event_for(params.subscribe),
        subscription: Subscription { depth, ..Subscription::new(SubscriptionKind::Book) },
        pair: vec![pair.to_owned()],
    })
}

/// Ticker requests require only `pair`.
fn build_ticker(params: &SubscriptionParams) -> Result<SubscriptionRequest, WsError> {
    let pair = params.pair.as_deref().ok_or(WsError::Argument("pair"))?;
    Ok(SubscriptionRequest {
        event: event_for(params.subscribe),
        subscription: Subscription::new(SubscriptionKind::Ticker),
        pair: vec![pair.to_owned()],
    })
}

fn event_for(subscribe: bool) -> RequestEvent {
    if subscribe { RequestEvent::Subscribe } else { RequestEvent::Unsubscribe }
}
