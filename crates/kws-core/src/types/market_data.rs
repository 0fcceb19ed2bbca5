//! Market data structures — price levels, order books, and tickers.
//!
//! All prices, volumes, and wire timestamps are [`Decimal`] values. Kraken
//! sends them as JSON strings and they are used as lookup keys during diff
//! merging, so binary floating point would drift on comparison.

use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Price level
// ---------------------------------------------------------------------------

/// One `[price, volume, timestamp]` entry on a side of an order book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: Decimal,
    /// Exchange timestamp (seconds with fractional part, as sent on the wire).
    pub timestamp: Decimal,
}

// ---------------------------------------------------------------------------
// Order book
// ---------------------------------------------------------------------------

/// In-memory view of one subscribed price ladder.
///
/// Levels are kept in arrival order, one level per distinct price per side.
/// A level is present iff its most recently applied volume is nonzero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderBook {
    /// Server-assigned channel ID; known once the first snapshot arrives.
    pub channel_id: Option<i64>,
    /// Channel name carried by book frames (e.g. `"book-10"`).
    pub channel_name: String,
    /// Traded pair (e.g. `"NANO/ETH"`).
    pub pair: String,
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
}

impl OrderBook {
    /// Merge a side-specific diff into this book.
    ///
    /// For each incoming level, matched against the side by exact price key:
    /// - absent price, nonzero volume → **insert** (arrival order preserved)
    /// - absent price, zero volume → no-op (removal already converged)
    /// - present price, zero volume → **remove** the level
    /// - present price, nonzero volume → update volume and timestamp in place
    ///
    /// Re-applying the same diff converges to the same state.
    pub fn apply_diff(&mut self, asks: &[PriceLevel], bids: &[PriceLevel]) {
        if !asks.is_empty() {
            merge_levels(&mut self.asks, asks);
        }
        if !bids.is_empty() {
            merge_levels(&mut self.bids, bids);
        }
    }
}

/// Merge incoming levels into one side of a book, keyed by price.
fn merge_levels(side: &mut Vec<PriceLevel>, incoming: &[PriceLevel]) {
    for update in incoming {
        match side.iter().position(|level| level.price == update.price) {
            Some(idx) if update.volume.is_zero() => {
                side.remove(idx);
            }
            Some(idx) => {
                side[idx].volume = update.volume;
                side[idx].timestamp = update.timestamp;
            }
            None if update.volume.is_zero() => {}
            None => side.push(update.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Ticker payload — the `(today, last-24h)` style tuples Kraken sends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TickerData {
    /// Best ask: `(price, whole lot volume, lot volume)`.
    pub ask: (Decimal, i64, Decimal),
    /// Best bid: `(price, whole lot volume, lot volume)`.
    pub bid: (Decimal, i64, Decimal),
    /// Last trade closed: `(price, lot volume)`.
    pub close: (Decimal, Decimal),
    /// Volume: `(today, last 24 hours)`.
    pub volume: (Decimal, Decimal),
    /// Volume-weighted average price: `(today, last 24 hours)`.
    pub average_price: (Decimal, Decimal),
    /// Number of trades: `(today, last 24 hours)`.
    pub trades: (i64, i64),
    /// Low price: `(today, last 24 hours)`.
    pub low_price: (Decimal, Decimal),
    /// High price: `(today, last 24 hours)`.
    pub high_price: (Decimal, Decimal),
    /// Today's opening price: `(today, last 24 hours)`.
    pub open_price: (Decimal, Decimal),
}

/// A ticker update for one pair. Identity key: `(channel_name, pair)`;
/// a later update fully replaces the prior value for that key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    pub channel_id: i64,
    pub channel_name: String,
    pub pair: String,
    pub data: TickerData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, volume: Decimal) -> PriceLevel {
        PriceLevel { price, volume, timestamp: dec!(1650138439.570743) }
    }

    fn book_with_bids(bids: Vec<PriceLevel>) -> OrderBook {
        OrderBook {
            channel_id: Some(2128),
            channel_name: "book-10".into(),
            pair: "NANO/ETH".into(),
            asks: vec![],
            bids,
        }
    }

    #[test]
    fn zero_volume_removes_existing_level() {
        let mut book = book_with_bids(vec![
            level(dec!(0.00070062), dec!(521.46800762)),
            level(dec!(0.00069989), dec!(26.6)),
        ]);
        book.apply_diff(&[], &[level(dec!(0.00070062), dec!(0))]);
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.bids[0].price, dec!(0.00069989));
    }

    #[test]
    fn zero_volume_for_absent_price_is_noop() {
        let mut book = book_with_bids(vec![level(dec!(0.00069989), dec!(26.6))]);
        book.apply_diff(&[], &[level(dec!(0.00070062), dec!(0))]);
        assert_eq!(book.bids.len(), 1);
    }

    #[test]
    fn absent_price_with_volume_inserts() {
        let mut book = book_with_bids(vec![level(dec!(0.00069989), dec!(26.6))]);
        book.apply_diff(&[], &[level(dec!(0.00070764), dec!(265.70008036))]);
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.bids[1].price, dec!(0.00070764));
    }

    #[test]
    fn repeated_update_keeps_single_level_with_last_volume() {
        let mut book = book_with_bids(vec![]);
        book.apply_diff(&[], &[level(dec!(0.0007), dec!(5))]);
        book.apply_diff(&[], &[level(dec!(0.0007), dec!(9))]);
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.bids[0].volume, dec!(9));
    }

    #[test]
    fn reapplying_same_diff_converges() {
        let mut book = book_with_bids(vec![level(dec!(0.0007), dec!(5))]);
        let diff = [level(dec!(0.0007), dec!(0)), level(dec!(0.0008), dec!(3))];
        book.apply_diff(&[], &diff);
        let once = book.clone();
        book.apply_diff(&[], &diff);
        assert_eq!(book, once);
    }
}
