// End-to-end tests against a real local WebSocket server.
//
// Each test binds 127.0.0.1:0 and drives the host side with
// tokio-tungstenite directly.

use companion_client::{ClientConfig, CompanionClient, ConnectionState, TtsOptions};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Forward every payload of `event` into a channel.
fn forward(client: &CompanionClient, event: &str) -> mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.on(event, move |data| {
        let _ = tx.send(data.clone());
        Ok(())
    });
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

#[tokio::test]
async fn test_typed_packet_and_outbound_frame() {
    let (listener, url) = bind().await;
    let (host_tx, mut host_rx) = mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"version":1,"type":"tts_status","body":{"state":"speaking"}}"#.to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let _ = host_tx.send(serde_json::from_str(&text).unwrap());
            }
        }
    });

    let client = CompanionClient::new(ClientConfig::default());
    let mut connected = forward(&client, "connected");
    let mut status = forward(&client, "tts_status");
    let mut data = forward(&client, "data");

    client.connect(&url);
    let event_loop = client.spawn();

    assert_eq!(next(&mut connected).await, json!({}));
    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(next(&mut status).await, json!({"state": "speaking"}));
    assert_eq!(
        next(&mut data).await,
        json!({"version": 1, "type": "tts_status", "body": {"state": "speaking"}})
    );

    assert!(client.tts().speak("hello", &TtsOptions::default()));
    assert_eq!(
        next(&mut host_rx).await,
        json!({"version": 1, "type": "tts_request", "body": "hello"})
    );

    client.disconnect();
    client.shutdown();
    event_loop.await.unwrap();
}

#[tokio::test]
async fn test_malformed_frame_is_dropped() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("{{ not json".to_string())).await.unwrap();
        ws.send(Message::Text(r#"{"type":"after"}"#.to_string()))
            .await
            .unwrap();
        while ws.next().await.is_some() {}
    });

    let client = CompanionClient::new(ClientConfig::default());
    let mut data = forward(&client, "data");
    client.connect(&url);
    let event_loop = client.spawn();

    // Only the well-formed frame arrives.
    assert_eq!(next(&mut data).await["type"], "after");
    assert_eq!(client.state(), ConnectionState::Open);

    client.disconnect();
    client.shutdown();
    event_loop.await.unwrap();
}

#[tokio::test]
async fn test_reconnects_after_host_closes() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        // First connection: close immediately.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
        drop(ws);

        // Second connection: stay open.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let config = ClientConfig {
        reconnect_delay_ms: 50,
        ..ClientConfig::default()
    };
    let client = CompanionClient::new(config);
    let mut connected = forward(&client, "connected");
    let mut disconnected = forward(&client, "disconnected");

    client.connect(&url);
    let event_loop = client.spawn();

    next(&mut connected).await;
    next(&mut disconnected).await;
    next(&mut connected).await;

    assert_eq!(client.state(), ConnectionState::Open);
    assert_eq!(client.current_url().as_deref(), Some(url.as_str()));

    client.disconnect();
    client.shutdown();
    event_loop.await.unwrap();
}

#[tokio::test]
async fn test_send_before_open_is_dropped() {
    let client = CompanionClient::new(ClientConfig::default());
    assert!(!client.send("tts_skip", Value::Null));

    client.connect("ws://127.0.0.1:1");
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert!(!client.send("tts_skip", Value::Null));
}
