//! Connection lifecycle and the public client facade.
//!
//! One client owns at most one public connection. The first subscribe opens
//! it: the transport is connected, exactly one handshake frame is awaited and
//! decoded, and a background receive task is spawned that drives the
//! [`FeedState`] reconciler until the transport closes. No reconnect is
//! attempted; recovery is the caller's responsibility.
//!
//! Disconnection is single-flight: an async gate serializes callers, the
//! first one closes every online connection (with a bounded grace delay for
//! in-flight frames to drain) and empties the set, late callers pass the
//! gate and find nothing left to close. The transport is never closed twice.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kws_core::ws::{Connector, FrameSink, FrameStream, TlsConnector};
use kws_core::{
    Channel, ConnectionInfo, ConnectionStatus, OrderBook, SOCKET_PUBLIC, SubscriptionKind,
    Ticker, WsError,
};

use crate::decode::{self, Event};
use crate::request::{self, SubscriptionParams, SubscriptionRequest};
use crate::state::{BookCallback, FeedState, TickerCallback};

/// How long to wait for the handshake frame after the transport opens.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace delay after closing a transport, letting in-flight frames drain.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// An open connection and its metadata. Created by the lifecycle manager
/// from the handshake frame, never by application code.
struct Connection {
    info: ConnectionInfo,
    status: ConnectionStatus,
    is_private: bool,
    sink: Box<dyn FrameSink>,
}

#[derive(Default)]
struct ClientInner {
    /// Open connections, keyed by protocol-assigned connection ID.
    connections: AHashMap<String, Connection>,
    feed: FeedState,
    recv_tasks: Vec<JoinHandle<()>>,
}

impl ClientInner {
    fn public_online(&self) -> Option<&Connection> {
        self.connections
            .values()
            .find(|c| c.status == ConnectionStatus::Online && !c.is_private)
    }

    async fn send_public(&mut self, payload: &str) -> Result<(), WsError> {
        let connection = self
            .connections
            .values_mut()
            .find(|c| c.status == ConnectionStatus::Online && !c.is_private)
            .ok_or_else(|| WsError::Connection("no public connection online".into()))?;
        connection.sink.send(payload).await
    }
}

/// Client facade over the shared public connection.
///
/// ```no_run
/// # async fn run() -> Result<(), kws_core::WsError> {
/// let client = kws_client::KrakenClient::public();
/// client
///     .subscribe_order_book("ETH/BTC", 10, |book| {
///         println!("{} bids={} asks={}", book.pair, book.bids.len(), book.asks.len());
///     })
///     .await?;
/// // ...
/// client.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct KrakenClient {
    connector: Arc<dyn Connector>,
    endpoint: String,
    inner: Arc<Mutex<ClientInner>>,
    disconnect_gate: Mutex<()>,
}

impl KrakenClient {
    /// Client for Kraken's public endpoint over TLS.
    pub fn public() -> Self {
        Self::new(Arc::new(TlsConnector), SOCKET_PUBLIC)
    }

    /// Client with an explicit connector and endpoint.
    pub fn new(connector: Arc<dyn Connector>, endpoint: impl Into<String>) -> Self {
        Self {
            connector,
            endpoint: endpoint.into(),
            inner: Arc::new(Mutex::new(ClientInner::default())),
            disconnect_gate: Mutex::new(()),
        }
    }

    /// Open the public connection up front. Subscribe calls do this lazily,
    /// so calling it is optional.
    pub async fn connect(&self) -> Result<(), WsError> {
        self.ensure_connected().await
    }

    /// Subscribe to the order book for `pair` with `depth` levels per side.
    ///
    /// `on_update` replaces any previously registered book observer; it is
    /// invoked inline after each snapshot or diff is applied.
    pub async fn subscribe_order_book<F>(
        &self,
        pair: &str,
        depth: u32,
        on_update: F,
    ) -> Result<(), WsError>
    where
        F: Fn(&OrderBook) + Send + Sync + 'static,
    {
        self.ensure_connected().await?;
        let request = request::build(
            SubscriptionKind::Book,
            &SubscriptionParams::subscribe(pair).with_depth(depth),
        )?;
        let mut inner = self.inner.lock().await;
        inner.feed.set_on_book_changed(Arc::new(on_update) as BookCallback);
        inner.send_public(&encode(&request)?).await
    }

    /// Subscribe to ticker updates for `pair`.
    ///
    /// `on_update` replaces any previously registered ticker observer.
    pub async fn subscribe_ticker<F>(&self, pair: &str, on_update: F) -> Result<(), WsError>
    where
        F: Fn(&Ticker) + Send + Sync + 'static,
    {
        self.ensure_connected().await?;
        let request =
            request::build(SubscriptionKind::Ticker, &SubscriptionParams::subscribe(pair))?;
        let mut inner = self.inner.lock().await;
        inner.feed.set_on_ticker_changed(Arc::new(on_update) as TickerCallback);
        inner.send_public(&encode(&request)?).await
    }

    /// Send an unsubscribe request for every channel in subscribed status.
    ///
    /// Channels are removed from tracking when the exchange acknowledges,
    /// not here. Last-known book and ticker state is retained.
    pub async fn unsubscribe_all(&self) -> Result<(), WsError> {
        let mut inner = self.inner.lock().await;
        for channel in inner.feed.subscribed_channels() {
            let Some(request) = unsubscribe_request(&inner.feed, &channel)? else {
                debug!("no unsubscribe request for channel {}", channel.channel_id);
                continue;
            };
            inner.send_public(&encode(&request)?).await?;
        }
        Ok(())
    }

    /// Close every open connection. Idempotent and safe to call from
    /// concurrent tasks; the underlying transport close runs exactly once.
    pub async fn disconnect_all(&self) -> Result<(), WsError> {
        let _gate = self.disconnect_gate.lock().await;

        // Take everything out under the lock, then close without holding it
        // so the receive tasks can drain their final frames.
        let (doomed, tasks) = {
            let mut inner = self.inner.lock().await;
            let doomed: Vec<Connection> =
                inner.connections.drain().map(|(_, conn)| conn).collect();
            (doomed, std::mem::take(&mut inner.recv_tasks))
        };

        for mut connection in doomed {
            if connection.status != ConnectionStatus::Online {
                continue;
            }
            connection.status = ConnectionStatus::Closing;
            if let Err(e) = connection.sink.close().await {
                warn!("error closing connection {}: {e}", connection.info.connection_id);
            }
            tokio::time::sleep(CLOSE_GRACE).await;
            connection.status = ConnectionStatus::Closed;
            info!("connection closed: {}", connection.info.connection_id);
        }

        for task in tasks {
            let _ = task.await;
        }
        Ok(())
    }

    /// Unsubscribe every channel, then disconnect. The teardown path of the
    /// original context-managed session.
    pub async fn shutdown(&self) -> Result<(), WsError> {
        self.unsubscribe_all().await?;
        self.disconnect_all().await
    }

    /// Snapshot of all tracked order books.
    pub async fn order_books(&self) -> Vec<OrderBook> {
        self.inner.lock().await.feed.order_books()
    }

    /// Channels currently in subscribed status.
    pub async fn subscribed_channels(&self) -> Vec<Channel> {
        self.inner.lock().await.feed.subscribed_channels()
    }

    /// Snapshot of all tracked tickers.
    pub async fn tickers(&self) -> Vec<Ticker> {
        self.inner.lock().await.feed.tickers()
    }

    /// Open the transport and register the connection if no public
    /// connection is online. Holding the state lock across the open gives
    /// concurrent subscribers exactly one connect sequence.
    async fn ensure_connected(&self) -> Result<(), WsError> {
        let mut inner = self.inner.lock().await;
        if inner.public_online().is_some() {
            return Ok(());
        }

        let (sink, mut stream) = self.connector.open(&self.endpoint).await?;
        let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, stream.next_frame())
            .await
            .map_err(|_| WsError::Connection("no handshake frame received".into()))?
            .ok_or_else(|| WsError::Connection("transport closed before handshake".into()))?;
        let info = match decode::decode_frame(&frame) {
            Ok(Event::ConnectionStatus(info)) => info,
            _ => {
                return Err(WsError::Connection(format!(
                    "unexpected handshake frame: {frame}"
                )));
            }
        };
        info!(
            "connection online: id={} version={}",
            info.connection_id, info.version
        );

        let connection_id = info.connection_id.clone();
        inner.connections.insert(
            connection_id,
            Connection { info, status: ConnectionStatus::Online, is_private: false, sink },
        );
        let shared = Arc::clone(&self.inner);
        inner.recv_tasks.push(tokio::spawn(receive_loop(stream, shared)));
        Ok(())
    }
}

/// Standing receive loop: one per connection, ends when the transport closes.
/// Frame-level decode failures are logged and do not terminate the loop.
async fn receive_loop(mut stream: Box<dyn FrameStream>, inner: Arc<Mutex<ClientInner>>) {
    while let Some(frame) = stream.next_frame().await {
        match decode::decode_frame(&frame) {
            Ok(Event::Ignored) => debug!("ignoring frame: {frame}"),
            Ok(event) => inner.lock().await.feed.apply(event),
            Err(e) => warn!("dropping frame: {e}"),
        }
    }
    debug!("receive loop ended");
}

/// Build the unsubscribe payload for a channel, or `None` when the channel
/// carries too little context to address it.
///
/// Book channels do not carry their pair; it comes from the tracked book.
/// No tracked book → no frame is sent for that channel.
fn unsubscribe_request(
    feed: &FeedState,
    channel: &Channel,
) -> Result<Option<SubscriptionRequest>, WsError> {
    match channel.subscription.name {
        SubscriptionKind::Book => {
            let Some(pair) = feed.book_pair(channel.channel_id) else {
                return Ok(None);
            };
            Ok(Some(request::build(
                SubscriptionKind::Book,
                &SubscriptionParams::unsubscribe(&pair),
            )?))
        }
        SubscriptionKind::Ticker => {
            if channel.pair.is_empty() {
                return Ok(None);
            }
            Ok(Some(request::build(
                SubscriptionKind::Ticker,
                &SubscriptionParams::unsubscribe(&channel.pair),
            )?))
        }
        _ => Ok(None),
    }
}

fn encode(request: &SubscriptionRequest) -> Result<String, WsError> {
    serde_json::to_string(request).map_err(|e| WsError::Transport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    const HANDSHAKE: &str = r#"{"connectionID":8628615390848610000,"event":"systemStatus","status":"online","version":"1.0.0"}"#;

    const ACK_FRAME: &str = r#"{"channelID":2128,"channelName":"book-10","event":"subscriptionStatus","pair":"NANO/ETH","status":"subscribed","subscription":{"depth":10,"name":"book"}}"#;

    const SNAPSHOT_FRAME: &str = r#"[2128,{"as":[["0.00070268","5.09240716","1650138439.570743"],["0.00070269","8.30209792","1650138431.584508"]],"bs":[["0.00070062","521.46800762","1650138439.347806"],["0.00069989","26.60000000","1650138439.544563"]]},"book-10","NANO/ETH"]"#;

    const BID_DIFF_FRAME: &str = r#"[2128,{"b":[["0.00070764","265.70008036","1650173638.242924"]],"c":"4140403579"},"book-10","NANO/ETH"]"#;

    /// Scripted transport: delivers the handshake plus canned frames, counts
    /// opens and closes, records what was sent.
    struct MockConnector {
        frames: Vec<String>,
        opens: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    impl MockConnector {
        fn new(frames: &[&str]) -> Self {
            Self {
                frames: frames.iter().map(|f| f.to_string()).collect(),
                opens: Arc::new(AtomicUsize::new(0)),
                closes: Arc::new(AtomicUsize::new(0)),
                sent: Arc::new(StdMutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn open(
            &self,
            _url: &str,
        ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), WsError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::unbounded_channel();
            tx.send(HANDSHAKE.to_string()).unwrap();
            for frame in &self.frames {
                tx.send(frame.clone()).unwrap();
            }
            let sink = MockSink {
                keepalive: Some(tx),
                closes: Arc::clone(&self.closes),
                sent: Arc::clone(&self.sent),
            };
            Ok((Box::new(sink), Box::new(MockStream { rx })))
        }
    }

    struct MockSink {
        /// Held open so the stream outlives its canned frames; dropped on close.
        keepalive: Option<mpsc::UnboundedSender<String>>,
        closes: Arc<AtomicUsize>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl FrameSink for MockSink {
        async fn send(&mut self, text: &str) -> Result<(), WsError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), WsError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.keepalive.take();
            Ok(())
        }
    }

    struct MockStream {
        rx: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl FrameStream for MockStream {
        async fn next_frame(&mut self) -> Option<String> {
            self.rx.recv().await
        }
    }

    fn client_with(connector: MockConnector) -> (KrakenClient, Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<StdMutex<Vec<String>>>) {
        let opens = Arc::clone(&connector.opens);
        let closes = Arc::clone(&connector.closes);
        let sent = Arc::clone(&connector.sent);
        (KrakenClient::new(Arc::new(connector), "wss://test.invalid"), opens, closes, sent)
    }

    async fn wait_for<F: Fn() -> bool>(ready: F) {
        for _ in 0..200 {
            if ready() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn first_subscribe_connects_exactly_once() {
        let (client, opens, _, sent) = client_with(MockConnector::new(&[]));

        client.subscribe_order_book("ETH/BTC", 10, |_| {}).await.unwrap();
        client.subscribe_ticker("ETH/BTC", |_| {}).await.unwrap();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        let sent = sent.lock().unwrap();
        assert_eq!(
            sent[0],
            r#"{"event":"subscribe","subscription":{"name":"book","depth":10},"pair":["ETH/BTC"]}"#
        );
        assert_eq!(
            sent[1],
            r#"{"event":"subscribe","subscription":{"name":"ticker"},"pair":["ETH/BTC"]}"#
        );
    }

    #[tokio::test]
    async fn snapshot_and_diff_reach_the_book_and_fire_observer() {
        let (client, _, _, _) =
            client_with(MockConnector::new(&[ACK_FRAME, SNAPSHOT_FRAME, BID_DIFF_FRAME]));
        let updates = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&updates);

        client
            .subscribe_order_book("NANO/ETH", 10, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        wait_for(|| updates.load(Ordering::SeqCst) >= 2).await;
        let books = client.order_books().await;
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].asks.len(), 2);
        assert_eq!(books[0].bids.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_disconnects_close_the_transport_once() {
        let (client, _, closes, _) = client_with(MockConnector::new(&[]));
        client.connect().await.unwrap();

        let (a, b) = tokio::join!(client.disconnect_all(), client.disconnect_all());
        a.unwrap();
        b.unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(client.order_books().await.is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_all_uses_the_tracked_book_pair() {
        let (client, _, _, sent) =
            client_with(MockConnector::new(&[ACK_FRAME, SNAPSHOT_FRAME]));

        client.subscribe_order_book("NANO/ETH", 10, |_| {}).await.unwrap();
        for _ in 0..200 {
            if !client.order_books().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!client.order_books().await.is_empty(), "snapshot never arrived");

        client.unsubscribe_all().await.unwrap();
        let sent = sent.lock().unwrap();
        assert_eq!(
            sent.last().unwrap(),
            r#"{"event":"unsubscribe","subscription":{"name":"book"},"pair":["NANO/ETH"]}"#
        );
    }

    #[tokio::test]
    async fn unsubscribe_skips_channels_without_a_tracked_book() {
        // Ack only — no snapshot ever arrives, so no book is tracked.
        let (client, _, _, sent) = client_with(MockConnector::new(&[ACK_FRAME]));

        client.subscribe_order_book("NANO/ETH", 10, |_| {}).await.unwrap();
        for _ in 0..200 {
            if !client.subscribed_channels().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(client.subscribed_channels().await.len(), 1);

        client.unsubscribe_all().await.unwrap();
        // Only the original subscribe was sent.
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn handshake_must_be_a_connection_status_frame() {
        struct BadHandshake;

        #[async_trait]
        impl Connector for BadHandshake {
            async fn open(
                &self,
                _url: &str,
            ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), WsError> {
                let (tx, rx) = mpsc::unbounded_channel();
                tx.send(r#"{"event":"heartbeat"}"#.to_string()).unwrap();
                let sink = MockSink {
                    keepalive: Some(tx),
                    closes: Arc::new(AtomicUsize::new(0)),
                    sent: Arc::new(StdMutex::new(Vec::new())),
                };
                Ok((Box::new(sink), Box::new(MockStream { rx })))
            }
        }

        let client = KrakenClient::new(Arc::new(BadHandshake), "wss://test.invalid");
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, WsError::Connection(_)));
    }
}
