//! Plain response-like values.

use std::fmt;
use std::sync::Arc;

use crate::frame::{FrameFields, FramePayload, HeaderMap};
use crate::port::{Port, PortError, PortMessage, PortUrl};

/// A static response plus the metadata needed to keep it live.
///
/// `port` is the end this side binds to; a port advertised only through
/// the port header is resolved when the value is dispatched. `projection`
/// is set when the body's mutations are being forwarded.
#[derive(Clone, Default)]
pub struct ResponseLike {
    fields: Option<FrameFields>,
    port: Option<Arc<dyn Port>>,
    projection: Option<u64>,
}

impl ResponseLike {
    pub fn new(fields: FrameFields) -> Self {
        Self {
            fields: Some(fields),
            ..Self::default()
        }
    }

    /// A response known only by its port. Nothing commits until the first
    /// `response.replace` arrives.
    pub fn from_port(port: Arc<dyn Port>) -> Self {
        Self {
            port: Some(port),
            ..Self::default()
        }
    }

    /// Rebuild a response from a `response.replace` message.
    pub fn from_message(message: PortMessage) -> Option<Self> {
        match message {
            PortMessage::Replace {
                frame,
                live,
                projection,
            } => Some(Self {
                fields: Some(frame.into_fields(false, 1)),
                port: None,
                projection: projection.filter(|_| live),
            }),
            _ => None,
        }
    }

    pub fn with_port(mut self, port: Arc<dyn Port>) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_projection(mut self, projection: u64) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn fields(&self) -> Option<&FrameFields> {
        self.fields.as_ref()
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.fields.as_ref().map(|fields| &fields.headers)
    }

    pub fn status(&self) -> Option<u16> {
        self.fields.as_ref().map(|fields| fields.status)
    }

    pub fn port(&self) -> Option<&Arc<dyn Port>> {
        self.port.as_ref()
    }

    pub fn projection(&self) -> Option<u64> {
        self.projection
    }

    /// Port URL advertised in `header`, if any.
    pub fn port_url(&self, header: &str) -> Option<Result<PortUrl, PortError>> {
        let value = self.headers()?.get(header)?;
        Some(match value.to_str() {
            Ok(text) => text.parse::<PortUrl>(),
            Err(_) => Err(PortError::InvalidUrl(
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )),
        })
    }

    /// The `response.replace` message carrying this response.
    pub fn to_message(&self) -> Option<PortMessage> {
        self.fields.as_ref().map(|fields| PortMessage::Replace {
            frame: FramePayload::from_fields(fields),
            live: self.projection.is_some(),
            projection: self.projection,
        })
    }
}

impl fmt::Debug for ResponseLike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseLike")
            .field("fields", &self.fields)
            .field("port", &self.port.as_ref().map(|port| port.url().cloned()))
            .field("projection", &self.projection)
            .finish()
    }
}
