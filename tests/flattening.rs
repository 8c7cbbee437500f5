//! Sequence, nested live and reactive input tests.

use std::time::Duration;

use futures_util::{stream, StreamExt};
use live_response::{
    Body, Input, LiveError, LiveResponse, ObservedValue, ProductionError, ReadyGate, ReadyState,
    ResponseOptions,
};
use serde_json::json;
use tokio::sync::watch;

mod common;

#[tokio::test]
async fn test_sequence_commits_each_item() {
    let live = LiveResponse::new(Input::sequence(stream::iter(vec!["a", "b", "c"])));
    let frames: Vec<_> = live.to_stream().collect().await;

    assert_eq!(common::texts(&frames), vec!["a", "b", "c"]);
    assert_eq!(live.ready_state(), ReadyState::Done);
}

#[tokio::test]
async fn test_sequence_respects_top_level_done_false() {
    let live = LiveResponse::with_options(
        Input::sequence(stream::iter(vec!["a", "b"])),
        ResponseOptions::new().done(false),
    )
    .unwrap();
    common::settle().await;

    assert_eq!(common::text(&live), "b");
    assert_eq!(live.ready_state(), ReadyState::Live);
}

#[tokio::test(start_paused = true)]
async fn test_sequence_stops_pulling_once_abandoned() {
    let ticks = stream::iter(1..=10).then(|n| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        format!("tick-{n}")
    });
    let live = LiveResponse::with_options(Input::sequence(ticks), ResponseOptions::new().done(false))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(common::text(&live), "tick-2");

    let replacement = live.replace_with("stop", ResponseOptions::new().done(false)).unwrap();
    assert_eq!(replacement.await, Ok(true));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(common::text(&live), "stop");
}

#[tokio::test]
async fn test_sequence_failure_fails_the_cycle() {
    let items = stream::iter(vec![
        Ok(Body::from("a")),
        Err(ProductionError::sequence("broken pipe")),
    ]);
    let live = LiveResponse::with_options("start", ResponseOptions::new().done(false)).unwrap();
    let replacement = live
        .replace_with(Input::try_sequence(items), ResponseOptions::new())
        .unwrap();

    assert_eq!(
        replacement.await,
        Err(LiveError::Production(ProductionError::sequence("broken pipe")))
    );
    assert_eq!(common::text(&live), "a");
    assert_eq!(live.ready_state(), ReadyState::Done);
}

#[tokio::test]
async fn test_sequence_items_are_dispatched_again() {
    let items = stream::iter(vec![
        Input::from("plain"),
        common::delayed("pending", 1),
    ]);
    let live = LiveResponse::new(Input::sequence(items));
    let frames: Vec<_> = live.to_stream().collect().await;
    assert_eq!(common::texts(&frames), vec!["plain", "pending"]);
}

#[tokio::test]
async fn test_nested_live_flattens_into_local_commits() {
    let upstream = LiveResponse::with_options("u1", ResponseOptions::new().done(false)).unwrap();
    let local = LiveResponse::new(upstream.clone());
    assert_eq!(common::text(&local), "u1");
    assert_eq!(local.ready_state(), ReadyState::Live);

    let mut frames = local.subscribe(Default::default());
    let _ = upstream.replace_with("u2", ResponseOptions::new().done(false)).unwrap();
    assert_eq!(frames.recv().await.unwrap().body().as_text(), Some("u2"));

    common::settle().await;
    assert_eq!(local.ready_state(), ReadyState::Live);

    let _ = upstream.replace_with("u3", ResponseOptions::new()).unwrap();
    assert_eq!(frames.recv().await.unwrap().body().as_text(), Some("u3"));
    assert!(frames.recv().await.is_none());
    assert_eq!(local.ready_state(), ReadyState::Done);
}

#[tokio::test]
async fn test_nested_live_with_done_false_stays_open() {
    let upstream = LiveResponse::new("once");
    let local =
        LiveResponse::with_options(upstream.clone(), ResponseOptions::new().done(false)).unwrap();

    upstream.ready_state_change(ReadyGate::Done).await.unwrap();
    common::settle().await;
    assert_eq!(common::text(&local), "once");
    assert_eq!(local.ready_state(), ReadyState::Live);
}

#[tokio::test]
async fn test_nested_upstream_failure_propagates() {
    let upstream = LiveResponse::with_options("u1", ResponseOptions::new().done(false)).unwrap();
    let local = LiveResponse::new(upstream.clone());

    let failing = Input::pending(async { Err::<Body, _>(ProductionError::rejected("gone")) });
    let _ = upstream.replace_with(failing, ResponseOptions::new()).unwrap();

    local.ready_state_change(ReadyGate::Done).await.unwrap();
    assert!(matches!(local.error(), Some(ProductionError::Upstream(_))));
}

#[tokio::test]
async fn test_watch_commits_changes_until_disconnected() {
    let (tx, rx) = watch::channel(Body::from("v1"));
    let live = LiveResponse::new(rx);
    assert_eq!(common::text(&live), "v1");

    let mut frames = live.subscribe(Default::default());
    tx.send(Body::from("v2")).unwrap();
    assert_eq!(frames.recv().await.unwrap().body().as_text(), Some("v2"));

    live.disconnect(false);
    common::settle().await;
    tx.send(Body::from("v3")).unwrap();
    common::settle().await;

    assert_eq!(common::text(&live), "v2");
    assert_eq!(live.ready_state(), ReadyState::Live);
}

#[tokio::test]
async fn test_watch_outlives_its_source() {
    let (tx, rx) = watch::channel(Body::from("only"));
    let live = LiveResponse::new(rx);
    drop(tx);
    common::settle().await;
    assert_eq!(live.ready_state(), ReadyState::Live);
}

#[tokio::test]
async fn test_transform_mutates_committed_body() {
    let live = LiveResponse::new(Input::transform(json!({ "count": 0 }), |value| {
        value
            .set("/count", 1)
            .map_err(|e| ProductionError::Transform(e.to_string()))
    }));

    let body = live.body();
    let observed: &ObservedValue = body.as_observed().unwrap();
    assert_eq!(observed.get("/count"), Some(json!(1)));

    live.ready_state_change(ReadyGate::Done).await.unwrap();
    assert!(live.error().is_none());
}

#[tokio::test]
async fn test_transform_needs_structured_body() {
    let live = LiveResponse::new(Input::transform("text", |_| Ok(())));
    live.ready_state_change(ReadyGate::Done).await.unwrap();
    assert!(matches!(live.error(), Some(ProductionError::Transform(_))));
}

#[tokio::test]
async fn test_self_flattening_is_rejected() {
    let live = LiveResponse::with_options("a", ResponseOptions::new().done(false)).unwrap();
    let replacement = live.replace_with(live.clone(), ResponseOptions::new()).unwrap();
    assert!(matches!(
        replacement.await,
        Err(LiveError::Production(ProductionError::Upstream(_)))
    ));
}
