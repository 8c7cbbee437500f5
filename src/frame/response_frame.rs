//! Immutable frame snapshots and their wire payload.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::frame::body::{Body, WireBody};
use crate::frame::headers::{self, HeaderMap, WireHeader};

/// Response type, mirroring the fetch `Response.type` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Basic,
    Cors,
    #[default]
    Default,
    Error,
    Opaque,
    #[serde(rename = "opaqueredirect")]
    OpaqueRedirect,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Default => "default",
            ResponseType::Error => "error",
            ResponseType::Opaque => "opaque",
            ResponseType::OpaqueRedirect => "opaqueredirect",
        };
        f.write_str(name)
    }
}

/// The replaceable fields of a response, before they are frozen into a
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFields {
    pub body: Body,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub response_type: ResponseType,
    pub redirected: bool,
    pub url: String,
    pub concurrent: bool,
}

impl Default for FrameFields {
    fn default() -> Self {
        Self {
            body: Body::Empty,
            status: 200,
            status_text: String::new(),
            headers: HeaderMap::new(),
            response_type: ResponseType::Default,
            redirected: false,
            url: String::new(),
            concurrent: false,
        }
    }
}

impl FrameFields {
    pub fn ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// One immutable snapshot of a live response, produced by a commit.
///
/// Cheap to clone; every clone refers to the same frozen data. The body
/// value itself may still be an [`ObservedValue`](crate::ObservedValue)
/// that its owner mutates in place.
#[derive(Clone, PartialEq)]
pub struct ResponseFrame {
    inner: Arc<FrameData>,
}

#[derive(PartialEq)]
struct FrameData {
    seq: u64,
    fields: FrameFields,
}

impl ResponseFrame {
    pub(crate) fn new(seq: u64, fields: FrameFields) -> Self {
        Self {
            inner: Arc::new(FrameData { seq, fields }),
        }
    }

    /// Commit sequence number within the owning instance.
    pub fn seq(&self) -> u64 {
        self.inner.seq
    }

    pub fn body(&self) -> &Body {
        &self.inner.fields.body
    }

    pub fn status(&self) -> u16 {
        self.inner.fields.status
    }

    pub fn status_text(&self) -> &str {
        &self.inner.fields.status_text
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.fields.headers
    }

    pub fn response_type(&self) -> ResponseType {
        self.inner.fields.response_type
    }

    pub fn redirected(&self) -> bool {
        self.inner.fields.redirected
    }

    pub fn url(&self) -> &str {
        &self.inner.fields.url
    }

    pub fn concurrent(&self) -> bool {
        self.inner.fields.concurrent
    }

    pub fn ok(&self) -> bool {
        self.inner.fields.ok()
    }

    /// Always true: a committed body is a value, so it counts as used.
    pub fn body_used(&self) -> bool {
        true
    }

    pub fn fields(&self) -> &FrameFields {
        &self.inner.fields
    }

    /// Wire form of this frame, as carried by `response.replace`.
    pub fn to_payload(&self) -> FramePayload {
        FramePayload::from_fields(self.fields())
    }
}

impl fmt::Debug for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFrame")
            .field("seq", &self.seq())
            .field("status", &self.status())
            .field("body", self.body())
            .field("concurrent", &self.concurrent())
            .finish()
    }
}

/// Payload of a `response.replace` port message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    pub body: WireBody,
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<WireHeader>,
    #[serde(rename = "type", default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub redirected: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub concurrent: bool,
}

impl FramePayload {
    pub(crate) fn from_fields(fields: &FrameFields) -> Self {
        Self {
            body: fields.body.to_wire(),
            status: fields.status,
            status_text: fields.status_text.clone(),
            headers: headers::to_wire(&fields.headers),
            response_type: fields.response_type,
            redirected: fields.redirected,
            url: fields.url.clone(),
            concurrent: fields.concurrent,
        }
    }

    pub(crate) fn into_fields(self, live: bool, mutation_capacity: usize) -> FrameFields {
        FrameFields {
            body: self.body.into_body(live, mutation_capacity),
            status: self.status,
            status_text: self.status_text,
            headers: headers::from_wire(self.headers),
            response_type: self.response_type,
            redirected: self.redirected,
            url: self.url,
            concurrent: self.concurrent,
        }
    }
}
