//! Mutation observation for structured bodies.
//!
//! # Data Flow
//! ```text
//! caller edits ObservedValue (set/remove/push)
//!     → edit applied under the value's write lock
//!     → Mutation published on the value's broadcast channel
//!     → outgoing projection forwards it over a Port
//!     → remote mirror applies it to its own ObservedValue
//! ```
//!
//! # Design Decisions
//! - The engine only observes caller-owned values; mirrors are separate
//!   values owned by the receiving side
//! - Publishing happens while the write lock is held, so subscribers see
//!   mutations in the order they were applied

pub mod mutation;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::broadcast;

pub use mutation::{Mutation, MutationError, MutationOp};

/// Default capacity of the mutation channel.
pub const DEFAULT_MUTATION_CAPACITY: usize = 256;

/// A shared JSON document whose in-place edits are observable.
///
/// Clones share the same document.
#[derive(Clone)]
pub struct ObservedValue {
    inner: Arc<Observed>,
}

struct Observed {
    value: RwLock<Value>,
    tx: broadcast::Sender<Mutation>,
}

impl ObservedValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with_capacity(value, DEFAULT_MUTATION_CAPACITY)
    }

    pub fn with_capacity(value: impl Into<Value>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Observed {
                value: RwLock::new(value.into()),
                tx,
            }),
        }
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> Value {
        self.read(Value::clone)
    }

    /// Value at a JSON pointer, if present.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.read(|value| value.pointer(path).cloned())
    }

    pub fn read<T>(&self, f: impl FnOnce(&Value) -> T) -> T {
        let value = self.inner.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&value)
    }

    pub fn set(&self, path: impl Into<String>, value: impl Into<Value>) -> Result<(), MutationError> {
        self.apply(Mutation::set(path, value))
    }

    pub fn remove(&self, path: impl Into<String>) -> Result<(), MutationError> {
        self.apply(Mutation::remove(path))
    }

    pub fn push(&self, path: impl Into<String>, value: impl Into<Value>) -> Result<(), MutationError> {
        self.apply(Mutation::push(path, value))
    }

    /// Apply a mutation and publish it to observers.
    pub fn apply(&self, mutation: Mutation) -> Result<(), MutationError> {
        let mut value = self.inner.value.write().unwrap_or_else(PoisonError::into_inner);
        mutation.apply_to(&mut value)?;
        // No receivers is not an error: nothing is projecting this value.
        let _ = self.inner.tx.send(mutation);
        Ok(())
    }

    /// Subscribe to mutations applied from now on.
    pub fn mutations(&self) -> broadcast::Receiver<Mutation> {
        self.inner.tx.subscribe()
    }

    /// Number of active mutation subscribers.
    pub fn observer_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    pub fn ptr_eq(&self, other: &ObservedValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObservedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObservedValue").field(&self.snapshot()).finish()
    }
}
