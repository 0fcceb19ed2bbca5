//! WebSocket transport seam.
//!
//! The engine only sees `open → (sink, stream)`, `send`, `receive`, `close`;
//! handshake, framing, and TLS stay behind the [`Connector`] trait.

pub mod transport;

pub use transport::{Connector, FrameSink, FrameStream, TlsConnector};
