//! Options recognized on construct and replace.

use serde::{Deserialize, Serialize};

use crate::error::LiveError;
use crate::frame::body::Body;
use crate::frame::headers::{self, HeaderMap};
use crate::frame::response_frame::{FrameFields, ResponseType};

/// Caller-supplied options. Unset fields take their defaults when the
/// cycle starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseOptions {
    pub status: Option<u16>,
    pub status_text: Option<String>,
    /// Raw name-value pairs, validated by [`normalize`](Self::normalize).
    pub headers: Vec<(String, String)>,
    #[serde(rename = "type")]
    pub response_type: Option<ResponseType>,
    pub redirected: Option<bool>,
    pub url: Option<String>,
    /// Whether finishing this cycle retires the instance (default true).
    pub done: Option<bool>,
    /// Whether prior mutation projections survive this replacement
    /// (default false).
    pub concurrent: Option<bool>,
}

impl ResponseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    /// Append every pair, keeping earlier values for the same name.
    pub fn headers<N, V>(mut self, headers: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(name, value)| (name.into(), value.into())));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn redirected(mut self, redirected: bool) -> Self {
        self.redirected = Some(redirected);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn done(mut self, done: bool) -> Self {
        self.done = Some(done);
        self
    }

    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = Some(concurrent);
        self
    }

    /// Validate and fill defaults.
    pub fn normalize(&self) -> Result<CycleOptions, LiveError> {
        let status = self.status.unwrap_or(200);
        if !(200..=599).contains(&status) {
            return Err(LiveError::InvalidStatus(status));
        }
        Ok(CycleOptions {
            status,
            status_text: self.status_text.clone().unwrap_or_default(),
            headers: headers::from_pairs(&self.headers)?,
            response_type: self.response_type.unwrap_or_default(),
            redirected: self.redirected.unwrap_or(false),
            url: self.url.clone().unwrap_or_default(),
            done: self.done.unwrap_or(true),
            concurrent: self.concurrent.unwrap_or(false),
        })
    }
}

/// Normalized options for one production cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOptions {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub response_type: ResponseType,
    pub redirected: bool,
    pub url: String,
    pub done: bool,
    pub concurrent: bool,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            status: 200,
            status_text: String::new(),
            headers: HeaderMap::new(),
            response_type: ResponseType::default(),
            redirected: false,
            url: String::new(),
            done: true,
            concurrent: false,
        }
    }
}

impl CycleOptions {
    /// Frame fields for an immediate body produced under these options.
    pub(crate) fn fields_for(&self, body: Body) -> FrameFields {
        FrameFields {
            body,
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            response_type: self.response_type,
            redirected: self.redirected,
            url: self.url.clone(),
            concurrent: self.concurrent,
        }
    }
}
