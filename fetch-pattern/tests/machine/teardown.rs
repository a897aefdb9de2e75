use fetch_pattern::{FetchRequest, FetchState, FetchStateMachine};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;

use test_helpers::{ScriptedTransport, init_tracing};

fn request() -> FetchRequest {
    FetchRequest::get("http://localhost/api/item")
}

#[tokio::test]
async fn unmount_before_success_freezes_loading() -> anyhow::Result<()> {
    init_tracing();
    let transport = Arc::new(
        ScriptedTransport::respond_json(StatusCode::OK, &json!({"id": 1}))
            .gated(),
    );

    let machine = FetchStateMachine::<serde_json::Value>::spawn(
        transport.clone(),
        request(),
    );
    machine.mark_unmounted();
    transport.release();

    // The request still runs to completion; its outcome is discarded
    assert_eq!(machine.settled().await, FetchState::Loading);
    assert!(machine.is_loading());
    assert_eq!(transport.calls(), 1);

    Ok(())
}

#[tokio::test]
async fn unmount_before_failure_freezes_loading() -> anyhow::Result<()> {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::fail("network down").gated());

    let machine = FetchStateMachine::<serde_json::Value>::spawn(
        transport.clone(),
        request(),
    );
    machine.mark_unmounted();
    transport.release();

    assert_eq!(machine.settled().await, FetchState::Loading);
    assert_eq!(machine.error_message(), None);

    Ok(())
}

#[tokio::test]
async fn unmount_is_idempotent() -> anyhow::Result<()> {
    init_tracing();
    let transport = Arc::new(
        ScriptedTransport::respond_json(StatusCode::OK, &json!([1, 2]))
            .gated(),
    );

    let machine = FetchStateMachine::<Vec<u32>>::spawn(
        transport.clone(),
        request(),
    );
    machine.mark_unmounted();
    machine.mark_unmounted();
    assert!(machine.is_unmounted());
    transport.release();
    machine.mark_unmounted();

    assert_eq!(machine.settled().await, FetchState::Loading);

    Ok(())
}

#[tokio::test]
async fn unmount_after_load_keeps_data() -> anyhow::Result<()> {
    init_tracing();
    let transport =
        ScriptedTransport::respond_json(StatusCode::OK, &json!([1, 2]));

    let machine = FetchStateMachine::<Vec<u32>>::spawn(transport, request());
    machine.settled().await;
    machine.mark_unmounted();
    machine.mark_unmounted();

    assert_eq!(machine.data(), Some(vec![1, 2]));

    Ok(())
}

#[tokio::test]
async fn unmounted_machine_never_starts() -> anyhow::Result<()> {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::fail("unused"));

    let machine = FetchStateMachine::<Vec<u32>>::new(
        transport.clone(),
        request(),
    );
    machine.mark_unmounted();

    assert!(!machine.start());
    assert!(machine.is_unloaded());
    assert_eq!(machine.settled().await, FetchState::Unloaded);
    assert_eq!(transport.calls(), 0);

    Ok(())
}

#[tokio::test]
async fn dropping_the_machine_discards_the_response() -> anyhow::Result<()> {
    init_tracing();
    let transport = Arc::new(
        ScriptedTransport::respond_json(StatusCode::OK, &json!([1]))
            .gated(),
    );

    let machine = FetchStateMachine::<Vec<u32>>::spawn(
        transport.clone(),
        request(),
    );
    let mut updates = machine.subscribe();
    assert!(updates.borrow_and_update().is_loading());
    drop(machine);
    transport.release();

    // The task finishes without writing again
    assert!(updates.changed().await.is_err());
    assert!(updates.borrow().is_loading());

    Ok(())
}
