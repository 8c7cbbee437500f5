//! WebSocket-backed ports.
//!
//! # Responsibilities
//! - Connect to `socket://<host:port/path>` endpoints (as `ws://`)
//! - Accept inbound WebSocket connections for publishers
//! - Encode port messages as JSON text frames
//!
//! # Design Decisions
//! - One writer task and one reader task per connection
//! - Messages queued before close are flushed before the close frame
//! - Undecodable frames are logged and skipped, never fatal
//! - Remote close or read error closes the port (an implicit `done`)

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::TransportConfig;
use crate::observability::metrics;
use crate::port::{Inbound, Port, PortError, PortMessage, PortScheme, PortUrl};
use crate::resilience::backoff::Backoff;

/// A port speaking over one WebSocket connection.
pub struct SocketPort {
    url: Option<PortUrl>,
    outbound: mpsc::UnboundedSender<PortMessage>,
    inbound: Inbound,
    closed: CancellationToken,
}

impl SocketPort {
    /// Wrap an established WebSocket. Must be called inside a Tokio runtime.
    pub fn from_stream<S>(ws: WebSocketStream<S>, url: Option<PortUrl>, capacity: usize) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let inbound = Inbound::new(capacity);
        let closed = CancellationToken::new();

        tokio::spawn(write_loop(sink, outbound_rx, closed.clone()));
        tokio::spawn(read_loop(stream, inbound.sender(), closed.clone()));

        Arc::new(Self {
            url,
            outbound,
            inbound,
            closed,
        })
    }

    /// Complete the server side of a WebSocket handshake.
    pub async fn accept(
        stream: TcpStream,
        url: Option<PortUrl>,
        capacity: usize,
    ) -> Result<Arc<Self>, PortError> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| PortError::Connect(e.to_string()))?;
        Ok(Self::from_stream(ws, url, capacity))
    }
}

impl Port for SocketPort {
    fn url(&self) -> Option<&PortUrl> {
        self.url.as_ref()
    }

    fn post_message(&self, message: PortMessage) -> Result<(), PortError> {
        if self.closed.is_cancelled() {
            return Err(PortError::Closed);
        }
        metrics::record_port_message("out", message.kind());
        self.outbound.send(message).map_err(|_| PortError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<PortMessage> {
        self.inbound.subscribe()
    }

    fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

async fn write_loop<S>(
    mut sink: futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::UnboundedReceiver<PortMessage>,
    closed: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            next = outbound.recv() => match next {
                Some(message) => message,
                None => break,
            },
            _ = closed.cancelled() => break,
        };
        if let Err(e) = send_json(&mut sink, &message).await {
            tracing::warn!(error = %e, "Socket port write failed");
            closed.cancel();
            return;
        }
    }

    while let Ok(message) = outbound.try_recv() {
        if send_json(&mut sink, &message).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
    closed.cancel();
    tracing::debug!("Socket port writer stopped");
}

async fn send_json<S>(
    sink: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    message: &PortMessage,
) -> Result<(), PortError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = serde_json::to_string(message).map_err(|e| PortError::Encode(e.to_string()))?;
    sink.send(Message::text(text))
        .await
        .map_err(|e| PortError::Connect(e.to_string()))
}

async fn read_loop<S>(
    mut stream: futures_util::stream::SplitStream<WebSocketStream<S>>,
    inbound: broadcast::Sender<PortMessage>,
    closed: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = closed.cancelled() => break,
            frame = stream.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<PortMessage>(text.as_str()) {
                    Ok(message) => {
                        metrics::record_port_message("in", message.kind());
                        let _ = inbound.send(message);
                    }
                    Err(e) => tracing::warn!(error = %e, "Dropping undecodable socket frame"),
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Socket port read failed");
                break;
            }
        }
    }
    closed.cancel();
    tracing::debug!("Socket port reader stopped");
}

/// Opens socket ports with timeout and retry.
#[derive(Debug, Clone)]
pub struct SocketConnector {
    connect_timeout: Duration,
    attempts: u32,
    backoff: Backoff,
    capacity: usize,
}

impl SocketConnector {
    pub fn new(config: &TransportConfig, capacity: usize) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            attempts: config.connect_attempts.max(1),
            backoff: Backoff::from_millis(config.backoff_base_ms, config.backoff_max_ms),
            capacity,
        }
    }

    /// WebSocket endpoint for a socket port URL.
    pub fn endpoint(url: &PortUrl) -> Result<Url, PortError> {
        if url.scheme() != PortScheme::Socket {
            return Err(PortError::UnsupportedScheme(url.scheme().as_str().to_string()));
        }
        Url::parse(&format!("ws://{}", url.id()))
            .map_err(|e| PortError::InvalidUrl(format!("{url}: {e}")))
    }

    pub async fn connect(&self, url: &PortUrl) -> Result<Arc<SocketPort>, PortError> {
        let endpoint = Self::endpoint(url)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match tokio::time::timeout(
                self.connect_timeout,
                tokio_tungstenite::connect_async(endpoint.as_str()),
            )
            .await
            {
                Ok(Ok((ws, _))) => {
                    tracing::debug!(url = %url, attempt, "Socket port connected");
                    return Ok(SocketPort::from_stream(ws, Some(url.clone()), self.capacity));
                }
                Ok(Err(e)) => PortError::Connect(e.to_string()),
                Err(_) => PortError::Timeout(self.connect_timeout.as_millis() as u64),
            };

            if attempt >= self.attempts {
                tracing::warn!(url = %url, attempt, error = %failure, "Socket port connect failed");
                return Err(failure);
            }

            let delay = self.backoff.delay(attempt);
            tracing::info!(url = %url, attempt, delay = ?delay, error = %failure, "Retrying socket connect");
            tokio::time::sleep(delay).await;
        }
    }
}
