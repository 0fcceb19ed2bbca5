//! Transport traits and the tokio-tungstenite implementation.
//!
//! A connection opens into independent send and receive halves so one task
//! can sit on the frame stream while subscribe requests go out concurrently.
//! The stream is infinite until the transport closes and is not restartable;
//! no reconnect is attempted at this layer.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::WsError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of an open transport.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send(&mut self, text: &str) -> Result<(), WsError>;

    /// Close the transport. The paired [`FrameStream`] ends shortly after.
    async fn close(&mut self) -> Result<(), WsError>;
}

/// Inbound half of an open transport — a lazy sequence of text frames.
#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame, or `None` once the transport has closed.
    async fn next_frame(&mut self) -> Option<String>;
}

/// Opens transports. Abstracted so the engine can run against a scripted
/// transport in tests.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str)
    -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), WsError>;
}

// ---------------------------------------------------------------------------
// tokio-tungstenite implementation
// ---------------------------------------------------------------------------

/// Production connector: TLS WebSocket via tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnector;

#[async_trait]
impl Connector for TlsConnector {
    async fn open(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), WsError> {
        debug!("opening websocket: {url}");
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| WsError::Connection(format!("{url}: {e}")))?;
        let (write, read) = stream.split();
        Ok((Box::new(WsSink { write }), Box::new(WsReader { read })))
    }
}

struct WsSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: &str) -> Result<(), WsError> {
        self.write
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| WsError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), WsError> {
        self.write.close().await.map_err(|e| WsError::Transport(e.to_string()))
    }
}

struct WsReader {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WsReader {
    async fn next_frame(&mut self) -> Option<String> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(Message::Close(_)) => {
                    debug!("received close frame");
                    return None;
                }
                // Ping replies are queued by tungstenite; other frame kinds
                // carry no market data on this protocol.
                Ok(_) => continue,
                Err(e) => {
                    warn!("websocket read error: {e}");
                    return None;
                }
            }
        }
    }
}
