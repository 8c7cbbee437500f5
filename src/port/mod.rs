//! Port abstraction: the bidirectional transport used to mirror frames and
//! mutations across a boundary.
//!
//! # Data Flow
//! ```text
//! publisher side                         mirror side
//!   commit → response.replace  ──Port──→  commit on the mirror instance
//!   body edit → response.mutate ─Port──→  apply to the mirror body
//!   done → response.done       ──Port──→  mirror cycle completes
//!                              close   →  implicit done
//! ```
//!
//! # Backends
//! - `channel.rs`: in-process pair, not addressable
//! - `broadcast.rs`: named fan-out channels (`broadcast://<name>`)
//! - `socket.rs`: WebSocket transport (`socket://<host:port/path>`)
//!
//! # Design Decisions
//! - A port buffers inbound messages from the moment it is opened; the
//!   first `subscribe` drains that buffer, later ones see new traffic only
//! - Closing is a signal, not an error: mirrors treat it as `done`

pub mod broadcast;
pub mod channel;
pub mod projection;
pub mod resolver;
pub mod socket;

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast as tokio_broadcast;
use tokio_util::sync::CancellationToken;

use crate::frame::FramePayload;
use crate::observe::Mutation;

pub use self::broadcast::{BroadcastHub, BroadcastPort};
pub use channel::ChannelPort;
pub use projection::{project_mutations, MirrorSet};
pub use resolver::{PortResolver, Transports};
pub use socket::{SocketConnector, SocketPort};

/// Header through which a response-like source advertises its live port.
pub const DEFAULT_PORT_HEADER: &str = "X-Message-Port";

/// Default capacity of a port's inbound queue.
pub const DEFAULT_PORT_CAPACITY: usize = 256;

/// Transport schemes a port URL may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortScheme {
    Socket,
    Broadcast,
}

impl PortScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortScheme::Socket => "socket",
            PortScheme::Broadcast => "broadcast",
        }
    }
}

impl FromStr for PortScheme {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "socket" => Ok(PortScheme::Socket),
            "broadcast" => Ok(PortScheme::Broadcast),
            other => Err(PortError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// `<scheme>://<connection-identifier>` as carried in the port header.
///
/// The identifier is opaque here and handed to the transport unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortUrl {
    scheme: PortScheme,
    id: String,
}

impl PortUrl {
    pub fn new(scheme: PortScheme, id: impl Into<String>) -> Self {
        Self {
            scheme,
            id: id.into(),
        }
    }

    pub fn scheme(&self) -> PortScheme {
        self.scheme
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for PortUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme.as_str(), self.id)
    }
}

impl FromStr for PortUrl {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, id) = s
            .trim()
            .split_once("://")
            .ok_or_else(|| PortError::InvalidUrl(s.to_string()))?;
        if id.is_empty() {
            return Err(PortError::InvalidUrl(s.to_string()));
        }
        Ok(Self::new(scheme.parse()?, id))
    }
}

/// Messages exchanged over a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PortMessage {
    /// A new frame. With `live`, the body's mutations follow as
    /// `response.mutate` messages tagged with `projection`.
    #[serde(rename = "response.replace")]
    Replace {
        frame: FramePayload,
        #[serde(default)]
        live: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        projection: Option<u64>,
    },

    /// One in-place edit of a projected body.
    #[serde(rename = "response.mutate")]
    Mutate { projection: u64, mutation: Mutation },

    /// The publishing response reached `done`.
    #[serde(rename = "response.done")]
    Done,
}

impl PortMessage {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            PortMessage::Replace { .. } => "response.replace",
            PortMessage::Mutate { .. } => "response.mutate",
            PortMessage::Done => "response.done",
        }
    }
}

/// Errors raised by port operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("port is closed")]
    Closed,

    #[error("unsupported port scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid port url: {0}")]
    InvalidUrl(String),

    #[error("no transport configured for {0}")]
    Unresolvable(String),

    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection timed out after {0} ms")]
    Timeout(u64),
}

/// A bidirectional message channel with an open/close lifecycle.
pub trait Port: Send + Sync + 'static {
    /// Address advertised in the port header, if the port is addressable.
    fn url(&self) -> Option<&PortUrl>;

    /// Send a message to the other side.
    fn post_message(&self, message: PortMessage) -> Result<(), PortError>;

    /// Receive inbound messages.
    fn subscribe(&self) -> tokio_broadcast::Receiver<PortMessage>;

    /// Cancelled when the port closes, from either side.
    fn close_signal(&self) -> CancellationToken;

    fn close(&self) {
        self.close_signal().cancel();
    }

    fn is_closed(&self) -> bool {
        self.close_signal().is_cancelled()
    }
}

/// Inbound queue shared by the port backends.
///
/// The receiver created with the queue is parked until the first
/// subscriber takes it, so nothing sent before binding is lost.
pub(crate) struct Inbound {
    tx: tokio_broadcast::Sender<PortMessage>,
    parked: Mutex<Option<tokio_broadcast::Receiver<PortMessage>>>,
}

impl Inbound {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = tokio_broadcast::channel(capacity.max(1));
        Self {
            tx,
            parked: Mutex::new(Some(rx)),
        }
    }

    pub fn sender(&self) -> tokio_broadcast::Sender<PortMessage> {
        self.tx.clone()
    }

    pub fn deliver(&self, message: PortMessage) {
        // Dropped when nobody listens, same as an unstarted message port.
        let _ = self.tx.send(message);
    }

    pub fn subscribe(&self) -> tokio_broadcast::Receiver<PortMessage> {
        self.parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Body, FrameFields};
    use serde_json::json;

    #[test]
    fn test_port_url_parse() {
        let url: PortUrl = "socket://127.0.0.1:9000/live".parse().unwrap();
        assert_eq!(url.scheme(), PortScheme::Socket);
        assert_eq!(url.id(), "127.0.0.1:9000/live");
        assert_eq!(url.to_string(), "socket://127.0.0.1:9000/live");

        let url: PortUrl = "broadcast://feed".parse().unwrap();
        assert_eq!(url.scheme(), PortScheme::Broadcast);
    }

    #[test]
    fn test_port_url_rejects_unknown() {
        assert_eq!(
            "ftp://x".parse::<PortUrl>(),
            Err(PortError::UnsupportedScheme("ftp".into()))
        );
        assert!(matches!("socket://".parse::<PortUrl>(), Err(PortError::InvalidUrl(_))));
        assert!(matches!("nothing".parse::<PortUrl>(), Err(PortError::InvalidUrl(_))));
    }

    #[test]
    fn test_message_wire_shape() {
        let fields = FrameFields {
            body: Body::from("hi"),
            ..FrameFields::default()
        };
        let message = PortMessage::Replace {
            frame: FramePayload::from_fields(&fields),
            live: false,
            projection: None,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], json!("response.replace"));
        assert_eq!(value["frame"]["body"], json!({ "kind": "text", "value": "hi" }));
        assert!(value.get("projection").is_none());

        let done = serde_json::to_value(PortMessage::Done).unwrap();
        assert_eq!(done, json!({ "type": "response.done" }));
        assert_eq!(PortMessage::Done.kind(), "response.done");
    }

    #[tokio::test]
    async fn test_inbound_buffers_until_first_subscriber() {
        let inbound = Inbound::new(8);
        inbound.deliver(PortMessage::Done);
        let mut rx = inbound.subscribe();
        assert_eq!(rx.recv().await.unwrap(), PortMessage::Done);
    }
}
