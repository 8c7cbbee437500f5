//! Live mutation projection across ports.
//!
//! # Responsibilities
//! - Outgoing: forward an observed body's mutations as `response.mutate`
//!   messages until the projection signal is cancelled
//! - Incoming: keep the mirror values a receiver applies those messages to
//!
//! # Design Decisions
//! - Mutations already posted before cancellation are best-effort; the
//!   receiver applies whatever reaches it
//! - A non-concurrent replace drops every older mirror; a concurrent one
//!   keeps them so older projections keep landing

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::observe::{Mutation, ObservedValue};
use crate::port::{Port, PortMessage};

/// Start forwarding mutations of `from` over `port`.
///
/// Mutations applied after this call returns are forwarded; the task stops
/// when `signal` is cancelled, the port closes, or every handle on the
/// value is dropped.
pub fn project_mutations(
    port: Arc<dyn Port>,
    projection: u64,
    from: &ObservedValue,
    signal: CancellationToken,
) -> JoinHandle<()> {
    let mut mutations = from.mutations();
    let closed = port.close_signal();
    metrics::record_projection_started();
    tracing::debug!(projection, "Mutation projection started");

    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                _ = signal.cancelled() => break,
                _ = closed.cancelled() => break,
                next = mutations.recv() => next,
            };
            match next {
                Ok(mutation) => {
                    if port
                        .post_message(PortMessage::Mutate {
                            projection,
                            mutation,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(projection, skipped, "Projection lagged, mutations dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        metrics::record_projection_stopped();
        tracing::debug!(projection, "Mutation projection stopped");
    })
}

/// Mirror values on the receiving side, keyed by projection id.
#[derive(Default)]
pub struct MirrorSet {
    mirrors: HashMap<u64, ObservedValue>,
}

impl MirrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a replace message. Non-concurrent replaces drop every
    /// earlier mirror before `mirror` is registered.
    pub fn replaced(&mut self, concurrent: bool, mirror: Option<(u64, ObservedValue)>) {
        if !concurrent {
            self.mirrors.clear();
        }
        if let Some((projection, value)) = mirror {
            self.mirrors.insert(projection, value);
        }
    }

    /// Apply a forwarded mutation. Returns false if no mirror matched or the
    /// mutation did not apply.
    pub fn apply(&self, projection: u64, mutation: Mutation) -> bool {
        let Some(mirror) = self.mirrors.get(&projection) else {
            tracing::debug!(projection, "Mutation for retired projection ignored");
            return false;
        };
        match mirror.apply(mutation) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(projection, error = %e, "Projected mutation did not apply");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn clear(&mut self) {
        self.mirrors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::ChannelPort;
    use serde_json::json;

    #[tokio::test]
    async fn test_forwards_until_cancelled() {
        let (local, remote) = ChannelPort::pair();
        let mut inbound = remote.subscribe();
        let value = ObservedValue::new(json!({ "n": 0 }));
        let signal = CancellationToken::new();

        let task = project_mutations(local, 9, &value, signal.clone());
        value.set("/n", 1).unwrap();

        assert_eq!(
            inbound.recv().await.unwrap(),
            PortMessage::Mutate {
                projection: 9,
                mutation: Mutation::set("/n", 1)
            }
        );

        signal.cancel();
        task.await.unwrap();
        value.set("/n", 2).unwrap();
        assert!(inbound.try_recv().is_err());
    }

    #[test]
    fn test_mirror_set_concurrency() {
        let mut mirrors = MirrorSet::new();
        let first = ObservedValue::new(json!({}));
        let second = ObservedValue::new(json!({}));

        mirrors.replaced(false, Some((1, first.clone())));
        mirrors.replaced(true, Some((2, second.clone())));
        assert_eq!(mirrors.len(), 2);
        assert!(mirrors.apply(1, Mutation::set("/a", 1)));
        assert_eq!(first.get("/a"), Some(json!(1)));

        mirrors.replaced(false, None);
        assert!(mirrors.is_empty());
        assert!(!mirrors.apply(2, Mutation::set("/a", 1)));
        assert_eq!(second.get("/a"), None);
    }
}
