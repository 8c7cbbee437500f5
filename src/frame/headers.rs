//! Response headers: `http::HeaderMap` for the fields of a frame, a shared
//! handle that follows commits, and the name-value list used on the wire.

use std::sync::{Arc, PoisonError, RwLock};

use http::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::LiveError;

pub use http::HeaderMap;

/// One header as carried in a `response.replace` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireHeader {
    pub name: String,
    pub value: String,
}

/// Build a header map from caller-supplied pairs, keeping duplicates in
/// order. Names and values must be valid HTTP tokens.
pub(crate) fn from_pairs(pairs: &[(String, String)]) -> Result<HeaderMap, LiveError> {
    let mut map = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let parsed = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| LiveError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| LiveError::InvalidHeader(name.clone()))?;
        map.append(parsed, value);
    }
    Ok(map)
}

/// Set `name` to a single `value`. Returns false if either is not a valid
/// header token.
pub(crate) fn insert(map: &mut HeaderMap, name: &str, value: &str) -> bool {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            map.insert(name, value);
            true
        }
        _ => false,
    }
}

pub(crate) fn to_wire(map: &HeaderMap) -> Vec<WireHeader> {
    map.iter()
        .map(|(name, value)| WireHeader {
            name: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect()
}

/// Decode wire headers. Entries that are not valid headers are dropped.
pub(crate) fn from_wire(headers: Vec<WireHeader>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for header in headers {
        match (
            HeaderName::from_bytes(header.name.as_bytes()),
            HeaderValue::from_str(&header.value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => tracing::warn!(header = %header.name, "Dropping invalid header from payload"),
        }
    }
    map
}

/// Headers owned by a live response.
///
/// Every clone points at the same map. Commits clear and refill the map in
/// place, so a handle taken earlier always reads the current contents.
#[derive(Debug, Clone, Default)]
pub struct SharedHeaders {
    inner: Arc<RwLock<HeaderMap>>,
}

impl SharedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, if it is visible ASCII.
    pub fn get(&self, name: &str) -> Option<String> {
        self.read(|map| {
            map.get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        })
    }

    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.read(|map| {
            map.get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .map(str::to_owned)
                .collect()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read(|map| map.contains_key(name))
    }

    pub fn len(&self) -> usize {
        self.read(HeaderMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(HeaderMap::is_empty)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> HeaderMap {
        self.read(HeaderMap::clone)
    }

    /// Whether two handles share the same underlying map.
    pub fn ptr_eq(&self, other: &SharedHeaders) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn refill(&self, headers: &HeaderMap) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.clone_from(headers);
    }

    fn read<T>(&self, f: impl FnOnce(&HeaderMap) -> T) -> T {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&map)
    }
}
