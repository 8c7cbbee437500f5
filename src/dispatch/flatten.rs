//! Flattening of response-like and live inputs.
//!
//! A nested source is re-committed locally, frame by frame, until it
//! reaches its own terminal state. From outside the result looks like a
//! flat run of local replacements.

use std::sync::Arc;

use futures_util::future::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::dispatch::{finished, Context, Production};
use crate::error::ProductionError;
use crate::port::{MirrorSet, Port, PortMessage, PortUrl};
use crate::response::{LiveResponse, ResponseLike};

enum Source {
    Bound(Arc<dyn Port>, broadcast::Receiver<PortMessage>),
    Advertised(PortUrl),
}

/// Commit the response's current fields, then mirror its port until the
/// remote side is done or the port closes.
pub(super) fn response(context: &Context, response: ResponseLike) -> Production {
    let settings = context.engine.settings();
    let capacity = settings.mutation_capacity;
    let advertised = match response.port_url(&settings.port_header) {
        Some(Ok(url)) => Some(url),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Ignoring malformed port header");
            None
        }
        None => None,
    };
    let bound = response.port().is_some() || advertised.is_some();
    let mut mirrors = MirrorSet::new();

    if let Some(fields) = response.fields() {
        let mut fields = fields.clone();
        if let (true, Some(projection)) = (bound, response.projection()) {
            fields.body = fields.body.to_wire().into_body(true, capacity);
            if let Some(mirror) = fields.body.as_observed() {
                mirrors.replaced(false, Some((projection, mirror.clone())));
            }
        }
        context.commit_fields(fields);
    }

    let source = match (response.port(), advertised) {
        (Some(port), _) => Source::Bound(port.clone(), port.subscribe()),
        (None, Some(url)) => Source::Advertised(url),
        (None, None) => return finished(Ok(())),
    };
    let resolver = settings.resolver.clone();
    let scope = context.engine.concurrency_scope();
    let context = context.clone();

    async move {
        let (port, inbound) = match source {
            Source::Bound(port, inbound) => (port, inbound),
            Source::Advertised(url) => {
                let resolver = resolver.ok_or_else(|| {
                    ProductionError::Binding(format!("no resolver configured for {url}"))
                })?;
                let port = resolver
                    .resolve(&url)
                    .await
                    .map_err(|e| ProductionError::Binding(e.to_string()))?;
                let inbound = port.subscribe();
                (port, inbound)
            }
        };
        mirror(context, port, inbound, mirrors, scope).await
    }
    .boxed()
}

async fn mirror(
    context: Context,
    port: Arc<dyn Port>,
    mut inbound: broadcast::Receiver<PortMessage>,
    mut mirrors: MirrorSet,
    scope: CancellationToken,
) -> Result<(), ProductionError> {
    let cycle = context.cycle.clone();
    let closed = port.close_signal();
    let capacity = context.engine.settings().mutation_capacity;
    let url = port.url().map(ToString::to_string);
    context.engine.bind_port(&cycle, port);
    tracing::debug!(cycle = cycle.id(), url = ?url, "Port bound");

    loop {
        let received = tokio::select! {
            biased;
            _ = cycle.abandoned() => break,
            received = inbound.recv() => received,
            _ = closed.cancelled() => {
                tracing::debug!(cycle = cycle.id(), "Bound port closed");
                break;
            }
        };
        match received {
            Ok(PortMessage::Replace {
                frame,
                live,
                projection,
            }) => {
                let fields = frame.into_fields(live, capacity);
                let registered = match (live, projection, fields.body.as_observed()) {
                    (true, Some(id), Some(value)) => Some((id, value.clone())),
                    _ => None,
                };
                mirrors.replaced(fields.concurrent, registered);
                context.commit_fields(fields);
            }
            Ok(PortMessage::Mutate {
                projection,
                mutation,
            }) => {
                mirrors.apply(projection, mutation);
            }
            Ok(PortMessage::Done) => {
                tracing::debug!(cycle = cycle.id(), "Remote response done");
                break;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(cycle = cycle.id(), skipped, "Bound port lagged, messages dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }

    if !mirrors.is_empty() && !scope.is_cancelled() && !closed.is_cancelled() {
        tokio::spawn(linger(inbound, mirrors, scope, closed));
    }
    Ok(())
}

/// Keep applying projected mutations after the mirrored cycle ended, for as
/// long as the concurrency scope and the port last.
async fn linger(
    mut inbound: broadcast::Receiver<PortMessage>,
    mirrors: MirrorSet,
    scope: CancellationToken,
    closed: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            received = inbound.recv() => received,
            _ = closed.cancelled() => break,
        };
        match received {
            Ok(PortMessage::Mutate {
                projection,
                mutation,
            }) => {
                mirrors.apply(projection, mutation);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Mirror lagged, mutations dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::debug!(mirrors = mirrors.len(), "Mirror projections released");
}

/// Re-commit every commit of `upstream` until it is done.
pub(super) fn live(context: &Context, upstream: LiveResponse) -> Production {
    if Arc::ptr_eq(upstream.engine(), &context.engine) {
        return finished(Err(ProductionError::Upstream(
            "a live response cannot flatten into itself".into(),
        )));
    }

    let (current, mut commits) = upstream.engine().subscribe(CancellationToken::new());
    if let Some(commit) = current {
        context.commit_fields(commit.frame.fields().clone());
    }

    let context = context.clone();
    async move {
        let cycle = context.cycle.clone();
        loop {
            tokio::select! {
                biased;
                _ = cycle.abandoned() => return Ok(()),
                next = commits.recv() => match next {
                    Some(commit) => {
                        context.commit_fields(commit.frame.fields().clone());
                    }
                    None => break,
                },
            }
        }
        match upstream.error() {
            Some(e) => Err(ProductionError::Upstream(e.to_string())),
            None => Ok(()),
        }
    }
    .boxed()
}
