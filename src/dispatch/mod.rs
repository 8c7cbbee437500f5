//! Input dispatch: turns a replacement input into frames.
//!
//! # Data Flow
//! ```text
//! run(engine, cycle, input)
//!     → produce(): synchronous prefix commits right away
//!         Value / Transform      → one frame
//!         Response / Live        → the source's current frame
//!         Watch                  → the handle's current value
//!     → remaining production spawned as one task
//!         Pending   → await, then produce() the result
//!         Sequence  → pull, produce() each item, stop once abandoned
//!         Live      → re-commit each upstream commit until upstream done
//!         Response  → bind the port, re-commit replace messages
//!         Watch     → commit each change until abandoned
//!     → Replacement resolves: false the moment the cycle is abandoned,
//!       otherwise engine.finish() once production ends
//! ```
//!
//! # Design Decisions
//! - Classification happens once, on the `Input` tag
//! - Production is never cancelled by abandonment, only the caller's
//!   answer is; a late value still reaches the cycle's `now` gate
//! - Sequences check abandonment between pulls only

pub mod input;
mod flatten;
mod sequence;

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::sync::oneshot;

use crate::engine::{Commit, Engine};
use crate::error::ProductionError;
use crate::frame::{Body, FrameFields};
use crate::lifecycle::cycle::CycleToken;
use crate::response::Replacement;

pub use input::{Input, TransformFn};

type Production = BoxFuture<'static, Result<(), ProductionError>>;

/// Start producing `input` for `cycle`. Synchronous inputs have committed
/// by the time this returns.
pub(crate) fn run(engine: Arc<Engine>, cycle: CycleToken, input: Input) -> Replacement {
    let (tx, rx) = oneshot::channel();
    let context = Context {
        engine: engine.clone(),
        cycle: cycle.clone(),
    };
    tracing::debug!(cycle = cycle.id(), input = input.kind(), "Dispatching input");
    let production = produce(&context, input);

    tokio::spawn(async move {
        let mut production = production;
        // The caller may have dropped its Replacement, so sends are ignored.
        tokio::select! {
            biased;
            result = &mut production => {
                let _ = tx.send(engine.finish(&cycle, result));
            }
            _ = cycle.abandoned() => {
                let _ = tx.send(Ok(false));
                let result = production.await;
                let _ = engine.finish(&cycle, result);
            }
        }
    });

    Replacement::new(rx)
}

/// Shared handles for everything produced on behalf of one cycle.
#[derive(Clone)]
pub(crate) struct Context {
    engine: Arc<Engine>,
    cycle: CycleToken,
}

impl Context {
    fn commit_body(&self, body: Body) -> Option<Commit> {
        self.engine
            .commit(&self.cycle, self.cycle.options().fields_for(body))
    }

    /// Commit fields produced elsewhere. A concurrent cycle keeps every
    /// frame it commits concurrent.
    fn commit_fields(&self, mut fields: FrameFields) -> Option<Commit> {
        fields.concurrent |= self.cycle.options().concurrent;
        self.engine.commit(&self.cycle, fields)
    }
}

/// Run the synchronous part of `input` now and return the rest.
fn produce(context: &Context, input: Input) -> Production {
    match input {
        Input::Value(body) => {
            context.commit_body(body);
            finished(Ok(()))
        }
        Input::Transform { body, transform } => {
            let body = body.into_observed();
            context.commit_body(body.clone());
            let result = match body.as_observed() {
                Some(value) => transform(value),
                None => Err(ProductionError::Transform(
                    "transform needs a structured body".into(),
                )),
            };
            finished(result)
        }
        Input::Pending(pending) => {
            let context = context.clone();
            async move {
                let resolved = pending.await?;
                produce(&context, resolved).await
            }
            .boxed()
        }
        Input::Response(response) => flatten::response(context, response),
        Input::Live(upstream) => flatten::live(context, upstream),
        Input::Sequence(stream) => sequence::drive(context.clone(), stream),
        Input::Watch(handle) => sequence::watch(context, handle),
    }
}

fn finished(result: Result<(), ProductionError>) -> Production {
    future::ready(result).boxed()
}
