//! Response body values.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::observe::ObservedValue;

/// The body carried by a frame.
///
/// A body is a value, not a stream: reading it never consumes it.
/// `Observed` bodies are the only ones whose in-place mutations may be
/// projected across a port.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(Value),
    Observed(ObservedValue),
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&ObservedValue> {
        match self {
            Body::Observed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Whether in-place mutations of this body can be projected.
    pub fn is_observed(&self) -> bool {
        matches!(self, Body::Observed(_))
    }

    /// JSON view of structured bodies (a snapshot for observed ones).
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Body::Json(value) => Some(value.clone()),
            Body::Observed(value) => Some(value.snapshot()),
            _ => None,
        }
    }

    /// Convert into an observed body, wrapping plain JSON if needed.
    pub(crate) fn into_observed(self) -> Body {
        match self {
            Body::Json(value) => Body::Observed(ObservedValue::new(value)),
            other => other,
        }
    }

    pub(crate) fn to_wire(&self) -> WireBody {
        match self {
            Body::Empty => WireBody::Empty,
            Body::Text(text) => WireBody::Text(text.clone()),
            Body::Bytes(bytes) => WireBody::Bytes(bytes.clone()),
            Body::Json(value) => WireBody::Json(value.clone()),
            Body::Observed(value) => WireBody::Json(value.snapshot()),
        }
    }
}

/// Equality compares contents; observed bodies compare by snapshot.
impl PartialEq for Body {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Body::Empty, Body::Empty) => true,
            (Body::Text(a), Body::Text(b)) => a == b,
            (Body::Bytes(a), Body::Bytes(b)) => a == b,
            (Body::Observed(a), Body::Observed(b)) if a.ptr_eq(b) => true,
            (a, b) => match (a.to_json(), b.to_json()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Body::Empty,
            Value::String(text) => Body::Text(text),
            other => Body::Json(other),
        }
    }
}

impl From<ObservedValue> for Body {
    fn from(value: ObservedValue) -> Self {
        Body::Observed(value)
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}

/// Serialized form of a body on the wire. Observed bodies travel as their
/// JSON snapshot; the `live` flag on the message says whether to mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum WireBody {
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(Value),
}

impl WireBody {
    /// Rebuild a body, turning JSON into a fresh mirror when `live`.
    pub(crate) fn into_body(self, live: bool, mutation_capacity: usize) -> Body {
        match self {
            WireBody::Empty => Body::Empty,
            WireBody::Text(text) => Body::Text(text),
            WireBody::Bytes(bytes) => Body::Bytes(bytes),
            WireBody::Json(value) if live => {
                Body::Observed(ObservedValue::with_capacity(value, mutation_capacity))
            }
            WireBody::Json(value) => Body::Json(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_value() {
        assert_eq!(Body::from(json!(null)), Body::Empty);
        assert_eq!(Body::from(json!("hi")), Body::Text("hi".into()));
        assert_eq!(Body::from(json!({ "a": 1 })), Body::Json(json!({ "a": 1 })));
    }

    #[test]
    fn test_observed_equality_by_snapshot() {
        let observed = ObservedValue::new(json!([1, 2]));
        assert_eq!(Body::from(observed.clone()), Body::Json(json!([1, 2])));
        observed.push("", 3).unwrap();
        assert_ne!(Body::from(observed), Body::Json(json!([1, 2])));
    }

    #[test]
    fn test_wire_round_trip_for_live_json() {
        let body = Body::Observed(ObservedValue::new(json!({ "n": 1 })));
        let wire = body.to_wire();
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({ "kind": "json", "value": { "n": 1 } })
        );
        let mirror = wire.into_body(true, 16);
        assert!(mirror.is_observed());
        assert_eq!(mirror, body);
    }
}
