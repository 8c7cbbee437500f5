//! Replacement inputs.

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::watch;

use crate::error::ProductionError;
use crate::frame::Body;
use crate::observe::ObservedValue;
use crate::response::{LiveResponse, ResponseLike};

/// Closure run once against the observed body of a transform input.
pub type TransformFn = Box<dyn FnOnce(&ObservedValue) -> Result<(), ProductionError> + Send>;

/// A value handed to construct or `replace_with`.
///
/// Each variant selects one production strategy. Plain values convert
/// with `From`; futures and streams go through [`Input::pending`],
/// [`Input::sequence`] and [`Input::try_sequence`].
pub enum Input {
    /// Commits exactly one frame, synchronously.
    Value(Body),
    /// Commits the body as an observed value, then runs the transform
    /// against it once.
    Transform { body: Body, transform: TransformFn },
    /// Commits nothing until the future resolves; the result is dispatched
    /// again.
    Pending(BoxFuture<'static, Result<Input, ProductionError>>),
    /// An external response: its current fields, then its port traffic.
    Response(ResponseLike),
    /// Another live response, flattened into this one.
    Live(LiveResponse),
    /// One frame per item until the stream ends.
    Sequence(BoxStream<'static, Result<Input, ProductionError>>),
    /// The handle's current value, then one frame per change. Never
    /// finishes on its own.
    Watch(watch::Receiver<Body>),
}

impl Input {
    pub fn pending<F, T>(future: F) -> Self
    where
        F: Future<Output = Result<T, ProductionError>> + Send + 'static,
        T: Into<Input>,
    {
        Input::Pending(future.map(|result| result.map(Into::into)).boxed())
    }

    pub fn sequence<S, T>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
        T: Into<Input>,
    {
        Input::Sequence(stream.map(|item| Ok(item.into())).boxed())
    }

    pub fn try_sequence<S, T>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, ProductionError>> + Send + 'static,
        T: Into<Input>,
    {
        Input::Sequence(stream.map(|item| item.map(Into::into)).boxed())
    }

    pub fn transform<F>(body: impl Into<Body>, transform: F) -> Self
    where
        F: FnOnce(&ObservedValue) -> Result<(), ProductionError> + Send + 'static,
    {
        Input::Transform {
            body: body.into(),
            transform: Box::new(transform),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Input::Value(_) => "value",
            Input::Transform { .. } => "transform",
            Input::Pending(_) => "pending",
            Input::Response(_) => "response",
            Input::Live(_) => "live",
            Input::Sequence(_) => "sequence",
            Input::Watch(_) => "watch",
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Value(body) => f.debug_tuple("Value").field(body).finish(),
            other => f.debug_tuple(other.kind()).finish(),
        }
    }
}

impl From<Body> for Input {
    fn from(body: Body) -> Self {
        Input::Value(body)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Value(Body::from(text))
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Value(Body::from(text))
    }
}

impl From<Bytes> for Input {
    fn from(bytes: Bytes) -> Self {
        Input::Value(Body::from(bytes))
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Value(Body::from(value))
    }
}

impl From<ObservedValue> for Input {
    fn from(value: ObservedValue) -> Self {
        Input::Value(Body::from(value))
    }
}

impl From<()> for Input {
    fn from(_: ()) -> Self {
        Input::Value(Body::Empty)
    }
}

impl From<ResponseLike> for Input {
    fn from(response: ResponseLike) -> Self {
        Input::Response(response)
    }
}

impl From<LiveResponse> for Input {
    fn from(live: LiveResponse) -> Self {
        Input::Live(live)
    }
}

impl From<watch::Receiver<Body>> for Input {
    fn from(handle: watch::Receiver<Body>) -> Self {
        Input::Watch(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_values_classify_as_value() {
        assert_eq!(Input::from("hi").kind(), "value");
        assert_eq!(Input::from(json!({ "a": 1 })).kind(), "value");
        assert_eq!(Input::from(()).kind(), "value");
    }

    #[test]
    fn test_wrappers_select_strategy() {
        let pending = Input::pending(async { Ok::<_, ProductionError>("x") });
        assert_eq!(pending.kind(), "pending");

        let sequence = Input::sequence(futures_util::stream::iter(vec!["a", "b"]));
        assert_eq!(sequence.kind(), "sequence");

        let (_tx, rx) = watch::channel(Body::Empty);
        assert_eq!(Input::from(rx).kind(), "watch");

        let transform = Input::transform(json!({}), |_| Ok(()));
        assert_eq!(format!("{transform:?}"), "transform");
    }
}
