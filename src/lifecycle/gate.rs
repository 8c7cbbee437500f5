//! Single-resolution awaitable gates.

use std::sync::{Mutex, PoisonError};

use futures_util::future::{FutureExt, Shared};
use tokio::sync::oneshot;

/// Future returned by [`Gate::wait`]. Resolves to `Err` if the gate was
/// closed or dropped unresolved.
pub type GateWait<T> = Shared<oneshot::Receiver<T>>;

/// A value that resolves exactly once.
///
/// Every call to [`wait`](Gate::wait) returns a clone of the same shared
/// future, so there is only ever one underlying waiter.
pub struct Gate<T: Clone> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
    wait: GateWait<T>,
}

impl<T: Clone> Gate<T> {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx: Mutex::new(Some(tx)),
            wait: rx.shared(),
        }
    }

    /// Resolve the gate. Returns false if it was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                // The shared receiver lives in `self`, so the send cannot fail.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Give up on the gate without a value. Waiters see `Err`; returns false
    /// if it was already resolved or closed.
    pub fn close(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// True once resolved or closed.
    pub fn is_resolved(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn wait(&self) -> GateWait<T> {
        self.wait.clone()
    }
}

impl<T: Clone> Default for Gate<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_once() {
        let gate = Gate::new();
        assert!(!gate.is_resolved());
        assert!(gate.resolve(1));
        assert!(!gate.resolve(2));
        assert!(gate.is_resolved());
        assert_eq!(gate.wait().await, Ok(1));
    }

    #[tokio::test]
    async fn test_waiters_share_one_future() {
        let gate = std::sync::Arc::new(Gate::new());
        let first = gate.wait();
        let second = gate.wait();

        let resolver = gate.clone();
        tokio::spawn(async move {
            resolver.resolve("ready");
        });

        assert_eq!(first.await, Ok("ready"));
        assert_eq!(second.await, Ok("ready"));
    }

    #[tokio::test]
    async fn test_closed_gate_errors_and_stays_closed() {
        let gate: Gate<u8> = Gate::new();
        let wait = gate.wait();
        assert!(gate.close());
        assert!(!gate.close());
        assert!(!gate.resolve(3));
        assert!(wait.await.is_err());
        assert!(gate.wait().await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_gate_errors() {
        let gate: Gate<u8> = Gate::new();
        let wait = gate.wait();
        drop(gate);
        assert!(wait.await.is_err());
    }
}
