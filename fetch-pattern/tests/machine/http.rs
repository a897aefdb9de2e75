use fetch_pattern::{
    FetchRequest, FetchState, FetchStateMachine, HttpTransport, TransportConfig,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use test_helpers::{
    assert_error_state, init_tracing, spawn_http_stub, unused_address,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Site {
    id: u32,
    name: String,
}

fn transport() -> HttpTransport {
    HttpTransport::new(reqwest::Client::new())
}

#[tokio::test]
async fn loads_from_server() -> anyhow::Result<()> {
    init_tracing();
    let stub =
        spawn_http_stub(StatusCode::OK, r#"{"id":1,"name":"Workshop"}"#).await;

    let machine = FetchStateMachine::<Site>::spawn(
        transport(),
        FetchRequest::get(stub.url("/api/site")),
    );

    assert_eq!(machine.settled().await, FetchState::Loaded {
        data: Site {
            id: 1,
            name: "Workshop".into()
        }
    });
    assert!(stub.received().await?.starts_with("GET /api/site HTTP/1.1"));

    Ok(())
}

#[tokio::test]
async fn sends_method_headers_and_body() -> anyhow::Result<()> {
    init_tracing();
    let stub = spawn_http_stub(StatusCode::OK, r#"{"id":2,"name":"Desk"}"#)
        .await;
    let request = FetchRequest::post(stub.url("api/create_site"))
        .header("x-community", "alice")?
        .json(&json!({"name": "Desk"}))?;

    let machine = FetchStateMachine::<Site>::spawn(transport(), request);
    machine.settled().await;

    let received = stub.received().await?;
    let lowercase = received.to_lowercase();
    assert!(received.starts_with("POST /api/create_site HTTP/1.1"));
    assert!(lowercase.contains("x-community: alice"));
    assert!(lowercase.contains("content-type: application/json"));
    assert!(received.ends_with(r#"{"name":"Desk"}"#));
    assert!(machine.is_loaded());

    Ok(())
}

#[tokio::test]
async fn server_error_becomes_error_state() -> anyhow::Result<()> {
    init_tracing();
    let stub = spawn_http_stub(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal error",
    )
    .await;

    let machine = FetchStateMachine::<Site>::spawn(
        transport(),
        FetchRequest::get(stub.url("/api/site")),
    );
    let message = assert_error_state(&machine.settled().await);

    assert!(message.contains("500"), "{message}");
    assert!(message.ends_with("Internal error"), "{message}");

    Ok(())
}

#[tokio::test]
async fn connection_refused_becomes_error_state() -> anyhow::Result<()> {
    init_tracing();
    let address = unused_address().await;

    let machine = FetchStateMachine::<Site>::spawn(
        transport(),
        FetchRequest::get(format!("{address}/api/site"))
            .timeout(Duration::from_secs(5)),
    );

    assert_error_state(&machine.settled().await);

    Ok(())
}

#[tokio::test]
async fn relative_url_uses_configured_base() -> anyhow::Result<()> {
    init_tracing();
    let stub =
        spawn_http_stub(StatusCode::OK, r#"{"id":3,"name":"Garden"}"#).await;
    let config = TransportConfig {
        base_url: Some(stub.address.clone()),
        user_agent: "fetch-pattern-tests".into(),
        ..TransportConfig::default()
    };

    let machine = FetchStateMachine::<Site>::spawn(
        HttpTransport::from_config(&config)?,
        FetchRequest::get("/api/site"),
    );

    assert_eq!(
        machine.settled().await.into_data(),
        Some(Site {
            id: 3,
            name: "Garden".into()
        })
    );
    let received = stub.received().await?.to_lowercase();
    assert!(received.starts_with("get /api/site http/1.1"));
    assert!(received.contains("user-agent: fetch-pattern-tests"));

    Ok(())
}
