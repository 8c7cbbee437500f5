//! Forwarding a live response over a port.
//!
//! # Data Flow
//! ```text
//! to_response({ port, signal })
//!     → ResponseLike with the current frame (+ port header, projection id)
//!     → publisher task:
//!         each commit → response.replace (live when the body is observed)
//!                     → project_mutations scoped to the commit's
//!                       concurrency scope and the caller's signal
//!         instance done → response.done
//! ```
//!
//! # Design Decisions
//! - The current frame travels in the returned value, the port only
//!   carries later replacements
//! - Projection ids are frame sequence numbers, unique per instance

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::Commit;
use crate::frame::ResponseFrame;
use crate::port::{project_mutations, Port, PortMessage};

/// Options for `to_response`.
#[derive(Clone, Default)]
pub struct ToResponseOptions {
    /// Port to forward later replacements over.
    pub port: Option<Arc<dyn Port>>,
    /// Stops forwarding and projections when cancelled.
    pub signal: Option<CancellationToken>,
}

impl ToResponseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: Arc<dyn Port>) -> Self {
        self.port = Some(port);
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Projection id for a frame whose body can be projected.
pub(crate) fn projection_of(frame: &ResponseFrame) -> Option<u64> {
    frame.body().is_observed().then(|| frame.seq())
}

/// Start projecting `commit`'s body, if it is observed.
pub(crate) fn project(port: &Arc<dyn Port>, commit: &Commit, signal: &CancellationToken) {
    if let Some(value) = commit.frame.body().as_observed() {
        let scope = either(&commit.scope, signal);
        let _ = project_mutations(port.clone(), commit.frame.seq(), value, scope);
    }
}

/// Forward every commit received on `commits` until the instance is done,
/// the port closes or `signal` is cancelled.
pub(crate) fn spawn_publisher(
    port: Arc<dyn Port>,
    mut commits: mpsc::UnboundedReceiver<Commit>,
    signal: CancellationToken,
) -> JoinHandle<()> {
    let closed = port.close_signal();
    tokio::spawn(async move {
        let mut forwarded = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = signal.cancelled() => break,
                _ = closed.cancelled() => break,
                next = commits.recv() => next,
            };
            let Some(commit) = next else {
                if let Err(e) = port.post_message(PortMessage::Done) {
                    tracing::debug!(error = %e, "Port closed before done was sent");
                }
                break;
            };

            let projection = projection_of(&commit.frame);
            let message = PortMessage::Replace {
                frame: commit.frame.to_payload(),
                live: projection.is_some(),
                projection,
            };
            if let Err(e) = port.post_message(message) {
                tracing::debug!(error = %e, "Publisher stopped, port rejected replace");
                break;
            }
            forwarded += 1;
            project(&port, &commit, &signal);
        }
        tracing::debug!(forwarded, "Publisher stopped");
    })
}

/// A token cancelled as soon as either `a` or `b` is.
fn either(a: &CancellationToken, b: &CancellationToken) -> CancellationToken {
    let combined = a.child_token();
    if b.is_cancelled() {
        combined.cancel();
        return combined;
    }
    let watcher = combined.clone();
    let b = b.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = b.cancelled() => watcher.cancel(),
            _ = watcher.cancelled() => {}
        }
    });
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_either_follows_both_sides() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let combined = either(&a, &b);
        a.cancel();
        assert!(combined.is_cancelled());

        let a = CancellationToken::new();
        b.cancel();
        assert!(either(&a, &b).is_cancelled());

        let c = CancellationToken::new();
        let combined = either(&a, &c);
        assert!(!combined.is_cancelled());
        c.cancel();
        combined.cancelled().await;
    }
}
