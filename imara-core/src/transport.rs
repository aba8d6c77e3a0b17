//! Streaming transport for research sessions
//!
//! A [`Transport`] opens exactly one connection per session and hands back a
//! [`TransportHandle`]. The handle yields [`TransportEvent`]s in the order
//! they arrived; nothing is buffered for reordering. Closing the handle is
//! idempotent and guarantees no further events are delivered from it.
//!
//! The production implementation is [`WebSocketTransport`]. Other transports
//! (and tests) build handles with [`TransportHandle::channel`] and push
//! frames through the returned [`TransportFeed`].

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::protocol::encode_submit;
use crate::session::ConnectionId;

/// Something the connection produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame, undecoded
    Frame(String),
    /// Connection could not be opened or broke
    Failed(String),
    /// Remote side closed the connection
    Closed,
}

/// Opens streaming connections
pub trait Transport {
    /// Open a connection and submit `query` as soon as it is ready
    fn open(&self, query: &str, connection: ConnectionId) -> Result<TransportHandle>;
}

/// Receiving side of one connection, owned by the session driver
#[derive(Debug)]
pub struct TransportHandle {
    connection: ConnectionId,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    closed: bool,
}

/// Producing side of one connection
#[derive(Debug, Clone)]
pub struct TransportFeed {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportHandle {
    /// Build a handle together with the feed that fills it
    pub fn channel(connection: ConnectionId) -> (TransportFeed, TransportHandle) {
        let (tx, events) = mpsc::unbounded_channel();
        (
            TransportFeed { tx },
            TransportHandle {
                connection,
                events,
                closed: false,
            },
        )
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Wait for the next event
    ///
    /// Returns None once the handle is closed or the producer is gone.
    pub async fn next(&mut self) -> Option<TransportEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    /// Close the connection; safe to call more than once
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.close();
        tracing::debug!(connection = %self.connection, "Transport closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl TransportFeed {
    /// Deliver a text frame; false if the handle was closed
    pub fn frame(&self, text: impl Into<String>) -> bool {
        self.tx.send(TransportEvent::Frame(text.into())).is_ok()
    }

    /// Report a connection failure
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.tx.send(TransportEvent::Failed(message.into())).is_ok()
    }

    /// Report that the remote side closed the connection
    pub fn end(&self) -> bool {
        self.tx.send(TransportEvent::Closed).is_ok()
    }

    /// Whether the handle side has been closed or dropped
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the handle side is closed or dropped
    pub async fn cancelled(&self) {
        self.tx.closed().await
    }
}

/// WebSocket transport backed by `tokio-tungstenite`
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.ws_url.clone())
    }
}

impl Transport for WebSocketTransport {
    /// Spawns the connection task on the current tokio runtime
    fn open(&self, query: &str, connection: ConnectionId) -> Result<TransportHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Transport(format!("no async runtime available: {}", e)))?;

        let (feed, handle) = TransportHandle::channel(connection);
        let url = self.url.clone();
        let submit = encode_submit(query);

        tracing::info!(connection = %connection, url = %url, "Opening research stream");
        runtime.spawn(run_connection(url, submit, feed, connection));

        Ok(handle)
    }
}

async fn run_connection(
    url: String,
    submit: String,
    feed: TransportFeed,
    connection: ConnectionId,
) {
    let connect = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = feed.cancelled() => {
            tracing::debug!(connection = %connection, "Closed before connection was established");
            return;
        }
    };

    let (mut ws, _) = match connect {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(connection = %connection, error = %e, "Failed to connect");
            feed.fail(format!("could not connect to {}: {}", url, e));
            return;
        }
    };

    if let Err(e) = ws.send(Message::Text(submit)).await {
        tracing::warn!(connection = %connection, error = %e, "Failed to submit query");
        feed.fail(format!("failed to send query: {}", e));
        let _ = ws.close(None).await;
        return;
    }

    loop {
        tokio::select! {
            _ = feed.cancelled() => {
                let _ = ws.close(None).await;
                return;
            }
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if !feed.frame(text) {
                        let _ = ws.close(None).await;
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(connection = %connection, "Server closed the stream");
                    feed.end();
                    return;
                }
                // Ping/pong are answered by tungstenite; binary frames are not part of the protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(connection = %connection, error = %e, "Stream error");
                    feed.fail(e.to_string());
                    return;
                }
            }
        }
    }
}
