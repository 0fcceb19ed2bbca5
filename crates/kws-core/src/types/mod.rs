//! Domain types for the Kraken streaming protocol.
//!
//! Value types carry no behavior beyond equality, ordering, and the diff
//! merge on [`OrderBook`]; they are created by the decoder and the lifecycle
//! manager, never by application code directly.

pub mod enums;
pub mod market_data;
pub mod session;

pub use enums::*;
pub use market_data::*;
pub use session::*;
