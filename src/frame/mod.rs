//! Frame data model.
//!
//! # Data Flow
//! ```text
//! ResponseOptions (caller)
//!     → options.rs (validate status, fill defaults)
//!     → FrameFields (body + metadata for one production step)
//!     → ResponseFrame (frozen at commit, shared by observers)
//!     → FramePayload (wire shape for response.replace)
//! ```
//!
//! # Design Decisions
//! - Frames are immutable once built; clones share one allocation
//! - Headers are an `http::HeaderMap`, validated when options are
//!   normalized; the wire form is a plain name-value list
//! - The live instance exposes headers through a shared handle that is
//!   cleared and refilled on commit, never swapped

pub mod body;
pub mod headers;
pub mod options;
pub mod response_frame;

pub use body::{Body, WireBody};
pub use headers::{HeaderMap, SharedHeaders, WireHeader};
pub use options::{CycleOptions, ResponseOptions};
pub use response_frame::{FrameFields, FramePayload, ResponseFrame, ResponseType};
