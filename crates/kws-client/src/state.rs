//! Reconciliation of decoded events into tracked channels, books, tickers.
//!
//! All entities live in keyed maps (ID → entity), mutated only behind the
//! client's lock. One observer per data kind; the callback fires inline
//! after the mutation is committed, so it must not block for unbounded time.

use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, warn};

use kws_core::{Channel, ChannelStatus, OrderBook, Ticker};

use crate::decode::{BookDiff, Event};

/// Observer invoked after an order book changes.
pub type BookCallback = Arc<dyn Fn(&OrderBook) + Send + Sync>;

/// Observer invoked after a ticker changes.
pub type TickerCallback = Arc<dyn Fn(&Ticker) + Send + Sync>;

/// Tracked channel, book, and ticker state for one client.
#[derive(Default)]
pub struct FeedState {
    /// Acknowledged channels, keyed by server-assigned channel ID.
    channels: AHashMap<i64, Channel>,
    /// Order books, keyed by owning channel ID.
    books: AHashMap<i64, OrderBook>,
    /// Tickers, keyed by `(channel name, pair)`.
    tickers: AHashMap<(String, String), Ticker>,
    on_book_changed: Option<BookCallback>,
    on_ticker_changed: Option<TickerCallback>,
}

impl FeedState {
    /// Apply one decoded event. Connection-status frames are handled by the
    /// lifecycle manager at handshake time and ignored here.
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::ChannelStatus(channel) => self.apply_channel(channel),
            Event::BookSnapshot(book) => self.apply_snapshot(book),
            Event::BookDiff(diff) => self.apply_diff(diff),
            Event::TickerUpdate(ticker) => self.apply_ticker(ticker),
            Event::ConnectionStatus(_) | Event::Ignored => {}
        }
    }

    /// Register the book observer, replacing any prior one.
    pub fn set_on_book_changed(&mut self, callback: BookCallback) {
        self.on_book_changed = Some(callback);
    }

    /// Register the ticker observer, replacing any prior one.
    pub fn set_on_ticker_changed(&mut self, callback: TickerCallback) {
        self.on_ticker_changed = Some(callback);
    }

    /// Channels currently in subscribed status.
    pub fn subscribed_channels(&self) -> Vec<Channel> {
        self.channels
            .values()
            .filter(|c| c.status == ChannelStatus::Subscribed)
            .cloned()
            .collect()
    }

    /// Pair of the tracked book owned by `channel_id`, if any. Channel acks
    /// for books do not carry the pair reliably, so unsubscribe requests are
    /// built from the book itself.
    pub fn book_pair(&self, channel_id: i64) -> Option<String> {
        self.books.get(&channel_id).map(|b| b.pair.clone())
    }

    /// Snapshot of all tracked order books.
    pub fn order_books(&self) -> Vec<OrderBook> {
        self.books.values().cloned().collect()
    }

    /// Snapshot of all tracked tickers.
    pub fn tickers(&self) -> Vec<Ticker> {
        self.tickers.values().cloned().collect()
    }

    fn apply_channel(&mut self, channel: Channel) {
        match channel.status {
            ChannelStatus::Subscribed => {
                debug!("channel subscribed: id={} name={}", channel.channel_id, channel.channel_name);
                self.channels.insert(channel.channel_id, channel);
            }
            ChannelStatus::Unsubscribed => {
                debug!("channel unsubscribed: id={}", channel.channel_id);
                self.channels.remove(&channel.channel_id);
            }
        }
    }

    /// A snapshot replaces any book already keyed by its channel ID.
    fn apply_snapshot(&mut self, book: OrderBook) {
        let Some(channel_id) = book.channel_id else {
            warn!("book snapshot without channel ID dropped: pair={}", book.pair);
            return;
        };
        self.books.insert(channel_id, book);
        if let (Some(callback), Some(book)) = (&self.on_book_changed, self.books.get(&channel_id))
        {
            callback(book);
        }
    }

    /// Diffs do not repeat the channel ID; the target book is matched by
    /// `(channel name, pair)`. A diff with no matching book is a no-op —
    /// the protocol may deliver diffs before the snapshot arrives.
    fn apply_diff(&mut self, diff: BookDiff) {
        let target = self
            .books
            .values_mut()
            .find(|b| b.channel_name == diff.channel_name && b.pair == diff.pair);
        let Some(book) = target else {
            debug!("diff for unknown book dropped: {}/{}", diff.channel_name, diff.pair);
            return;
        };
        book.apply_diff(&diff.asks, &diff.bids);
        if let Some(callback) = &self.on_book_changed {
            callback(book);
        }
    }

    /// A later ticker fully replaces the prior value for its key.
    fn apply_ticker(&mut self, ticker: Ticker) {
        let key = (ticker.channel_name.clone(), ticker.pair.clone());
        self.tickers.insert(key.clone(), ticker);
        if let (Some(callback), Some(ticker)) = (&self.on_ticker_changed, self.tickers.get(&key)) {
            callback(ticker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal_macros::dec;

    use crate::decode::decode_frame;

    const SNAPSHOT_FRAME: &str = r#"[2128,{"as":[["0.00070268","5.09240716","1650138439.570743"],
        ["0.00070269","8.30209792","1650138431.584508"]],
        "bs":[["0.00070062","521.46800762","1650138439.347806"],
        ["0.00069989","26.60000000","1650138439.544563"]]},"book-10","NANO/ETH"]"#;

    const BID_DIFF_FRAME: &str = r#"[2128,{"b":[["0.00070764","265.70008036","1650173638.242924"]],
        "c":"4140403579"},"book-10","NANO/ETH"]"#;

    const ACK_FRAME: &str = r#"{"channelID":2128,"channelName":"book-10",
        "event":"subscriptionStatus","pair":"NANO/ETH","status":"subscribed",
        "subscription":{"depth":10,"name":"book"}}"#;

    fn apply_frame(state: &mut FeedState, frame: &str) {
        state.apply(decode_frame(frame).unwrap());
    }

    #[test]
    fn snapshot_then_diff_merges_by_price_key() {
        let mut state = FeedState::default();
        let updates = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&updates);
        state.set_on_book_changed(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        apply_frame(&mut state, SNAPSHOT_FRAME);
        apply_frame(&mut state, BID_DIFF_FRAME);

        let books = state.order_books();
        assert_eq!(books.len(), 1);
        let book = &books[0];
        assert_eq!(book.asks.len(), 2);
        assert_eq!(book.bids.len(), 3);
        assert_eq!(book.bids[2].price, dec!(0.00070764));
        assert_eq!(book.bids[2].volume, dec!(265.70008036));
        assert_eq!(updates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn second_snapshot_replaces_book_wholesale() {
        let mut state = FeedState::default();
        apply_frame(&mut state, SNAPSHOT_FRAME);
        apply_frame(
            &mut state,
            r#"[2128,{"as":[["0.00080000","1.0","1650200000.0"]],"bs":[]},"book-10","NANO/ETH"]"#,
        );
        let books = state.order_books();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].asks.len(), 1);
        assert!(books[0].bids.is_empty());
    }

    #[test]
    fn diff_before_snapshot_is_a_noop() {
        let mut state = FeedState::default();
        apply_frame(&mut state, BID_DIFF_FRAME);
        assert!(state.order_books().is_empty());
    }

    #[test]
    fn channel_ack_tracks_and_unsubscribe_removes() {
        let mut state = FeedState::default();
        apply_frame(&mut state, ACK_FRAME);
        assert_eq!(state.subscribed_channels().len(), 1);

        apply_frame(
            &mut state,
            r#"{"channelID":2128,"channelName":"book-10","event":"subscriptionStatus",
                "pair":"NANO/ETH","status":"unsubscribed","subscription":{"name":"book"}}"#,
        );
        assert!(state.subscribed_channels().is_empty());
    }

    #[test]
    fn book_pair_comes_from_tracked_book() {
        let mut state = FeedState::default();
        assert_eq!(state.book_pair(2128), None);
        apply_frame(&mut state, SNAPSHOT_FRAME);
        assert_eq!(state.book_pair(2128).as_deref(), Some("NANO/ETH"));
    }

    #[test]
    fn later_ticker_replaces_prior_for_same_key() {
        let mut state = FeedState::default();
        let ticker = |close: &str| {
            format!(
                r#"[340,{{"a":["5525.4",1,"1.0"],"b":["5525.1",1,"1.0"],
                    "c":["{close}","0.003"],"v":["2634.1","3591.1"],"p":["5631.4","5653.7"],
                    "t":[11493,16267],"l":["5505.0","5505.0"],"h":["5783.0","5783.0"],
                    "o":["5760.7","5763.4"]}},"ticker","XBT/USD"]"#
            )
        };
        apply_frame(&mut state, &ticker("5525.1"));
        apply_frame(&mut state, &ticker("5530.0"));

        let tickers = state.tickers();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].data.close.0, dec!(5530.0));
    }
}
