//! Implementations of the `companion` CLI subcommands.

use std::time::Duration;

use anyhow::{bail, Result};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::connection::{EVENT_CONNECTED, EVENT_DATA};
use crate::ws::http_to_ws_scheme;
use crate::CompanionClient;

/// Time given to the connection task to flush a frame before exit.
const FLUSH_GRACE: Duration = Duration::from_millis(200);

/// Pick the target URL: the flag wins over the configured default.
///
/// `http(s)://` URLs are rewritten to `ws(s)://`.
pub fn resolve_url(flag: Option<&str>, config: &ClientConfig) -> Result<String> {
    match flag.or(config.url.as_deref()) {
        Some(url) => Ok(http_to_ws_scheme(url)),
        None => bail!("No URL given; pass --url or set COMPANION_URL"),
    }
}

/// Parse a `--body` argument: JSON when it parses, otherwise a JSON string.
#[must_use]
pub fn parse_body(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Null,
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
    }
}

/// Whether `packet` passes the `--event` filter. An empty filter passes all.
#[must_use]
pub fn packet_matches(events: &[String], packet: &Value) -> bool {
    events.is_empty()
        || packet
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| events.iter().any(|e| e == t))
}

/// Print every received packet as one JSON line until Ctrl-C.
pub async fn listen(config: ClientConfig, url: &str, events: &[String]) -> Result<()> {
    let client = CompanionClient::new(config);
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    client.on(EVENT_DATA, move |packet| {
        let _ = tx.send(packet.clone());
        Ok(())
    });

    client.connect(url);
    let event_loop = client.spawn();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            packet = rx.recv() => {
                let Some(packet) = packet else { break };
                if packet_matches(events, &packet) {
                    println!("{packet}");
                }
            }
            _ = &mut ctrl_c => {
                log::info!("[Companion] Interrupted, shutting down");
                break;
            }
        }
    }

    client.disconnect();
    client.shutdown();
    let _ = event_loop.await;
    Ok(())
}

/// Connect, wait for the connection to open, send one packet and exit.
pub async fn send(
    config: ClientConfig,
    url: &str,
    packet_type: &str,
    body: Value,
    timeout: Duration,
) -> Result<()> {
    let client = CompanionClient::new(config);
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    client.on(EVENT_CONNECTED, move |_| {
        let _ = tx.send(());
        Ok(())
    });

    client.connect(url);
    let event_loop = client.spawn();

    let result = match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Some(())) => {
            if client.send(packet_type, body) {
                log::info!("[Companion] Sent '{}'", packet_type);
                tokio::time::sleep(FLUSH_GRACE).await;
                Ok(())
            } else {
                Err(anyhow::anyhow!("Connection closed before '{packet_type}' could be sent"))
            }
        }
        _ => Err(anyhow::anyhow!(
            "Timed out after {}s waiting to connect to {}",
            timeout.as_secs(),
            url
        )),
    };

    client.disconnect();
    client.shutdown();
    let _ = event_loop.await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(None), Value::Null);
        assert_eq!(parse_body(Some(r#"{"a":1}"#)), json!({"a": 1}));
        assert_eq!(parse_body(Some("0.5")), json!(0.5));
        assert_eq!(parse_body(Some("hello world")), json!("hello world"));
    }

    #[test]
    fn test_resolve_url() {
        let mut config = ClientConfig::default();
        assert!(resolve_url(None, &config).is_err());

        config.url = Some("http://localhost:9450".to_string());
        assert_eq!(resolve_url(None, &config).unwrap(), "ws://localhost:9450");
        assert_eq!(
            resolve_url(Some("wss://remote"), &config).unwrap(),
            "wss://remote"
        );
    }

    #[test]
    fn test_packet_matches() {
        let packet = json!({"type": "tts_status", "body": {}});
        assert!(packet_matches(&[], &packet));
        assert!(packet_matches(&["tts_status".to_string()], &packet));
        assert!(!packet_matches(&["stt_result".to_string()], &packet));
        assert!(!packet_matches(&["x".to_string()], &json!({"body": 1})));
    }

    #[tokio::test]
    async fn test_send_times_out_when_host_unreachable() {
        let err = send(
            ClientConfig::default(),
            "ws://127.0.0.1:1",
            "tts_skip",
            Value::Null,
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }
}
