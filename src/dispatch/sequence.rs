//! Pull-based sequences and reactive handles.

use futures_util::future::FutureExt;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::watch;

use crate::dispatch::{produce, Context, Input, Production};
use crate::error::ProductionError;
use crate::frame::Body;

/// Drive `stream` to exhaustion, producing every item in turn.
pub(super) fn drive(
    context: Context,
    mut stream: BoxStream<'static, Result<Input, ProductionError>>,
) -> Production {
    async move {
        let mut pulled = 0u64;
        loop {
            if context.cycle.is_abandoned() {
                tracing::debug!(cycle = context.cycle.id(), pulled, "Sequence stopped early");
                return Ok(());
            }
            let Some(item) = stream.next().await else {
                break;
            };
            pulled += 1;
            produce(&context, item?).await?;
        }
        tracing::debug!(cycle = context.cycle.id(), pulled, "Sequence exhausted");
        Ok(())
    }
    .boxed()
}

/// Commit the handle's current value now and every change after, until
/// the cycle is abandoned.
pub(super) fn watch(context: &Context, mut handle: watch::Receiver<Body>) -> Production {
    let current = handle.borrow_and_update().clone();
    context.commit_body(current);

    let context = context.clone();
    async move {
        let cycle = context.cycle.clone();
        loop {
            tokio::select! {
                _ = cycle.abandoned() => break,
                changed = handle.changed() => {
                    if changed.is_err() {
                        // The source is gone but the handle stays open until
                        // someone disconnects or replaces it.
                        cycle.abandoned().await;
                        break;
                    }
                    let body = handle.borrow_and_update().clone();
                    context.commit_body(body);
                }
            }
        }
        tracing::debug!(cycle = cycle.id(), "Reactive handle released");
        Ok(())
    }
    .boxed()
}
