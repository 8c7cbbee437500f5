//! Ready-state machine tests.

use futures_util::stream;
use live_response::{
    Body, Input, LiveError, LiveResponse, ProductionError, ReadyGate, ReadyState, ResponseOptions,
};
use tokio::sync::oneshot;

mod common;

#[tokio::test]
async fn test_immediate_value_is_live_then_done() {
    let live = LiveResponse::new("hello");
    assert_eq!(common::text(&live), "hello");
    assert_eq!(live.status(), 200);
    assert!(live.ok());
    assert_eq!(live.ready_state(), ReadyState::Live);

    common::settle().await;
    assert_eq!(live.ready_state(), ReadyState::Done);
}

#[tokio::test]
async fn test_done_false_keeps_instance_open() {
    let live = LiveResponse::with_options("first", ResponseOptions::new().done(false)).unwrap();
    common::settle().await;
    assert_eq!(live.ready_state(), ReadyState::Live);

    let replacement = live.replace_with("final", ResponseOptions::new()).unwrap();
    assert_eq!(common::text(&live), "final");
    assert_eq!(live.ready_state(), ReadyState::Live);

    assert_eq!(replacement.await, Ok(true));
    assert_eq!(live.ready_state(), ReadyState::Done);
}

#[tokio::test]
async fn test_pending_value_waits_for_resolution() {
    let (tx, rx) = oneshot::channel::<&'static str>();
    let live = LiveResponse::new(Input::pending(async move {
        rx.await.map_err(ProductionError::rejected)
    }));

    common::settle().await;
    assert_eq!(live.ready_state(), ReadyState::Waiting);
    assert!(!live.body_used());

    tx.send("x").unwrap();
    live.ready_state_change(ReadyGate::Live).await.unwrap();
    assert_eq!(common::text(&live), "x");

    live.ready_state_change(ReadyGate::Done).await.unwrap();
    assert_eq!(live.ready_state(), ReadyState::Done);
}

#[tokio::test]
async fn test_replace_after_done_is_rejected() {
    let live = LiveResponse::new("only");
    live.ready_state_change(ReadyGate::Done).await.unwrap();

    assert_eq!(
        live.replace_with("again", ResponseOptions::new()).err(),
        Some(LiveError::AlreadyDone)
    );
    assert_eq!(common::text(&live), "only");
}

#[tokio::test]
async fn test_rejected_pending_retires_with_failure() {
    let live = LiveResponse::with_options("start", ResponseOptions::new().done(false)).unwrap();
    let replacement = live
        .replace_with(
            Input::pending(async { Err::<Body, _>(ProductionError::rejected("boom")) }),
            ResponseOptions::new(),
        )
        .unwrap();

    assert_eq!(
        replacement.await,
        Err(LiveError::Production(ProductionError::rejected("boom")))
    );
    assert_eq!(live.ready_state(), ReadyState::Done);
    assert_eq!(live.error(), Some(ProductionError::rejected("boom")));
    assert_eq!(common::text(&live), "start");
}

#[tokio::test]
async fn test_cycle_without_frames_goes_straight_to_done() {
    let live = LiveResponse::new(Input::sequence(stream::empty::<Body>()));
    live.ready_state_change(ReadyGate::Live).await.unwrap();
    live.ready_state_change(ReadyGate::Done).await.unwrap();
    assert_eq!(live.ready_state(), ReadyState::Done);
    assert!(live.frame().is_none());
}

#[tokio::test]
async fn test_disconnect_leaves_ready_state() {
    let live = LiveResponse::new(common::never());
    live.disconnect(false);
    common::settle().await;
    assert_eq!(live.ready_state(), ReadyState::Waiting);

    let replacement = live.replace_with("late", ResponseOptions::new()).unwrap();
    assert_eq!(replacement.await, Ok(true));
    assert_eq!(live.ready_state(), ReadyState::Done);
}

#[tokio::test]
async fn test_repeated_waits_share_the_gate() {
    let live = LiveResponse::with_options(common::never(), ResponseOptions::new()).unwrap();
    let first = live.ready_state_change(ReadyGate::Done);
    let second = live.ready_state_change(ReadyGate::Done);

    let _ = live.replace_with("now", ResponseOptions::new()).unwrap();
    first.await.unwrap();
    second.await.unwrap();
}
