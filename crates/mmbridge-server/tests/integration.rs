//! End-to-end tests against a real bound server with `WebSocket` clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use mmbridge_broker::BrokerStats;
use mmbridge_core::protocol::SIGNER_HANDSHAKE;
use mmbridge_server::{BridgeServer, ServerConfig, ServerError};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        ..ServerConfig::default()
    }
}

async fn boot_with(config: ServerConfig) -> (Arc<BridgeServer>, SocketAddr) {
    let server = Arc::new(BridgeServer::new(config));
    let (addr, _handle) = server.listen().await.unwrap();
    (server, addr)
}

async fn boot_server() -> (Arc<BridgeServer>, String) {
    let (server, addr) = boot_with(test_config()).await;
    (server, format!("ws://{addr}/"))
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send_text(ws: &mut WsStream, text: &str) {
    ws.send(Message::text(text.to_owned())).await.unwrap();
}

async fn send_json(ws: &mut WsStream, value: &Value) {
    send_text(ws, &value.to_string()).await;
}

/// Next text frame, `None` once the socket closes.
async fn next_text(ws: &mut WsStream) -> Option<String> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

async fn read_json(ws: &mut WsStream) -> Value {
    let text = timeout(TIMEOUT, next_text(ws))
        .await
        .expect("timeout waiting for message")
        .expect("socket closed");
    serde_json::from_str(&text).unwrap()
}

async fn assert_silent(ws: &mut WsStream) {
    if let Ok(Some(text)) = timeout(QUIET, next_text(ws)).await {
        panic!("unexpected frame: {text}");
    }
}

async fn expect_closed(ws: &mut WsStream) {
    let closed = timeout(TIMEOUT, next_text(ws)).await.expect("socket stayed open");
    assert!(closed.is_none(), "expected close, got {closed:?}");
}

async fn wait_until(server: &BridgeServer, pred: impl Fn(&BrokerStats) -> bool) {
    let polled = timeout(TIMEOUT, async {
        loop {
            if pred(&server.broker().stats()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "stats never matched: {:?}", server.broker().stats());
}

async fn attach_signer(url: &str, server: &BridgeServer) -> WsStream {
    let mut signer = connect(url).await;
    send_text(&mut signer, SIGNER_HANDSHAKE).await;
    wait_until(server, |s| s.signer_connected).await;
    signer
}

async fn reply(signer: &mut WsStream, request_id: &Value, payload: Value) {
    send_json(
        signer,
        &json!({"action": "executed", "requestId": request_id, "payload": payload}),
    )
    .await;
}

fn request(id: u64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_before_signer_is_buffered_then_answered() {
    let (server, url) = boot_server().await;
    let mut client = connect(&url).await;
    send_json(&mut client, &request(1, "eth_accounts", json!([]))).await;
    wait_until(&server, |s| s.pending_requests == 1).await;

    let mut signer = connect(&url).await;
    send_text(&mut signer, SIGNER_HANDSHAKE).await;

    let command = read_json(&mut signer).await;
    assert_eq!(command["action"], "execute");
    assert!(command["requestId"].is_string());
    assert_eq!(
        command["payload"],
        json!({"jsonrpc": "2.0", "id": 1, "method": "eth_accounts", "params": []})
    );
    assert_eq!(server.broker().stats().pending_requests, 0);

    reply(&mut signer, &command["requestId"], json!(["0xabc"])).await;
    assert_eq!(
        read_json(&mut client).await,
        json!({"jsonrpc": "2.0", "id": 1, "result": ["0xabc"]})
    );
    wait_until(&server, |s| s.outstanding_requests == 0).await;
}

#[tokio::test]
async fn same_numeric_id_from_two_clients_answered_separately() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;

    send_json(&mut a, &request(5, "eth_accounts", json!([]))).await;
    let first = read_json(&mut signer).await;
    send_json(&mut b, &request(5, "eth_chainId", json!([]))).await;
    let second = read_json(&mut signer).await;
    assert_ne!(first["requestId"], second["requestId"]);

    // answer out of order
    reply(&mut signer, &second["requestId"], json!("0x1")).await;
    reply(&mut signer, &first["requestId"], json!(["0xaaa"])).await;

    assert_eq!(
        read_json(&mut a).await,
        json!({"jsonrpc": "2.0", "id": 5, "result": ["0xaaa"]})
    );
    assert_eq!(
        read_json(&mut b).await,
        json!({"jsonrpc": "2.0", "id": 5, "result": "0x1"})
    );
}

#[tokio::test]
async fn responses_carry_each_callers_envelope() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;

    send_json(&mut a, &json!({"jsonrpc": "2.0", "id": 11, "method": "eth_accounts"})).await;
    let cmd_a = read_json(&mut signer).await;
    send_json(&mut b, &json!({"jsonrpc": "1.0", "id": 22, "method": "eth_accounts"})).await;
    let cmd_b = read_json(&mut signer).await;
    assert_eq!(cmd_a["payload"]["params"], json!([]));

    reply(&mut signer, &cmd_b["requestId"], json!("for b")).await;
    reply(&mut signer, &cmd_a["requestId"], json!("for a")).await;

    let resp_a = read_json(&mut a).await;
    let resp_b = read_json(&mut b).await;
    assert_eq!((resp_a["jsonrpc"].clone(), resp_a["id"].clone()), (json!("2.0"), json!(11)));
    assert_eq!(resp_a["result"], "for a");
    assert_eq!((resp_b["jsonrpc"].clone(), resp_b["id"].clone()), (json!("1.0"), json!(22)));
    assert_eq!(resp_b["result"], "for b");
}

#[tokio::test]
async fn params_truncated_to_two() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut client = connect(&url).await;

    send_json(
        &mut client,
        &request(3, "eth_signTypedData_v4", json!(["0xabc", {"a": 1}, "c", 4])),
    )
    .await;
    let command = read_json(&mut signer).await;
    assert_eq!(command["payload"]["params"], json!(["0xabc", {"a": 1}]));
}

#[tokio::test]
async fn queued_requests_forwarded_in_arrival_order() {
    let (server, url) = boot_server().await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    for id in 1..=4_u64 {
        let ws = if id % 2 == 1 { &mut a } else { &mut b };
        send_json(ws, &request(id, "eth_accounts", json!([]))).await;
        wait_until(&server, |s| s.pending_requests == usize::try_from(id).unwrap()).await;
    }

    let mut signer = connect(&url).await;
    send_text(&mut signer, SIGNER_HANDSHAKE).await;
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(read_json(&mut signer).await["payload"]["id"].clone());
    }
    assert_eq!(ids, vec![json!(1), json!(2), json!(3), json!(4)]);
}

#[tokio::test]
async fn signer_error_relayed_as_result() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut client = connect(&url).await;

    send_json(&mut client, &request(9, "eth_sendTransaction", json!([{}]))).await;
    let command = read_json(&mut signer).await;
    reply(
        &mut signer,
        &command["requestId"],
        json!({"error": "User denied transaction signature."}),
    )
    .await;

    assert_eq!(
        read_json(&mut client).await,
        json!({"jsonrpc": "2.0", "id": 9, "result": {"error": "User denied transaction signature."}})
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure handling
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_request_dropped_silently() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut bad = connect(&url).await;
    let mut good = connect(&url).await;

    send_text(&mut bad, "{not json").await;
    assert_silent(&mut bad).await;
    assert_silent(&mut signer).await;

    send_json(&mut good, &request(1, "eth_accounts", json!([]))).await;
    let command = read_json(&mut signer).await;
    reply(&mut signer, &command["requestId"], json!([])).await;
    assert_eq!(read_json(&mut good).await["id"], 1);
}

#[tokio::test]
async fn second_signer_closed_first_keeps_slot() {
    let (server, url) = boot_server().await;
    let mut first = attach_signer(&url, &server).await;

    let mut second = connect(&url).await;
    send_text(&mut second, SIGNER_HANDSHAKE).await;
    expect_closed(&mut second).await;

    let mut client = connect(&url).await;
    send_json(&mut client, &request(1, "eth_accounts", json!([]))).await;
    let command = read_json(&mut first).await;
    assert_eq!(command["action"], "execute");
}

#[tokio::test]
async fn duplicate_reply_delivered_once() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut client = connect(&url).await;

    send_json(&mut client, &request(1, "eth_accounts", json!([]))).await;
    let command = read_json(&mut signer).await;
    reply(&mut signer, &command["requestId"], json!(["0x1"])).await;
    reply(&mut signer, &command["requestId"], json!(["0x2"])).await;

    assert_eq!(read_json(&mut client).await["result"], json!(["0x1"]));
    assert_silent(&mut client).await;
}

#[tokio::test]
async fn reply_for_unknown_id_dropped() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut client = connect(&url).await;
    send_json(&mut client, &request(1, "eth_accounts", json!([]))).await;
    let _ = read_json(&mut signer).await;

    reply(&mut signer, &json!("never-issued"), json!("x")).await;
    assert_silent(&mut client).await;
    assert_eq!(server.broker().stats().outstanding_requests, 1);
}

#[tokio::test]
async fn reply_after_caller_left_is_discarded() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut client = connect(&url).await;
    send_json(&mut client, &request(1, "eth_accounts", json!([]))).await;
    let command = read_json(&mut signer).await;

    client.close(None).await.unwrap();
    wait_until(&server, |s| s.clients == 0).await;

    reply(&mut signer, &command["requestId"], json!("late")).await;
    wait_until(&server, |s| s.outstanding_requests == 0).await;
    assert!(server.broker().stats().signer_connected);
}

#[tokio::test]
async fn signer_reconnect_resumes_forwarding() {
    let (server, url) = boot_server().await;
    let mut first = attach_signer(&url, &server).await;
    first.close(None).await.unwrap();
    wait_until(&server, |s| !s.signer_connected).await;

    let mut client = connect(&url).await;
    send_json(&mut client, &request(7, "eth_accounts", json!([]))).await;
    wait_until(&server, |s| s.pending_requests == 1).await;

    let mut second = connect(&url).await;
    send_text(&mut second, SIGNER_HANDSHAKE).await;
    let command = read_json(&mut second).await;
    assert_eq!(command["payload"]["id"], 7);
    reply(&mut second, &command["requestId"], json!(["0xfeed"])).await;
    assert_eq!(read_json(&mut client).await["result"], json!(["0xfeed"]));
}

#[tokio::test]
async fn silent_signer_dropped_by_heartbeat() {
    let (server, addr) = boot_with(ServerConfig {
        heartbeat_interval_secs: 1,
        heartbeat_timeout_secs: 1,
        ..test_config()
    })
    .await;
    let url = format!("ws://{addr}/");
    // never polled again, so pings go unanswered
    let _signer = attach_signer(&url, &server).await;
    wait_until(&server, |s| !s.signer_connected).await;
}

#[tokio::test]
async fn ws_path_also_accepts_connections() {
    let (server, addr) = boot_with(test_config()).await;
    let _signer = attach_signer(&format!("ws://{addr}/ws"), &server).await;
    assert!(server.broker().stats().signer_connected);
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle and HTTP
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bind_failure_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let server = BridgeServer::new(ServerConfig {
        port,
        ..ServerConfig::default()
    });
    match server.listen().await {
        Err(ServerError::Bind { addr, .. }) => assert_eq!(addr.port(), port),
        other => panic!("expected bind error, got {:?}", other.map(|(a, _)| a)),
    }
}

#[tokio::test]
async fn non_loopback_host_refused() {
    let server = BridgeServer::new(ServerConfig {
        host: "0.0.0.0".into(),
        port: 0,
        ..ServerConfig::default()
    });
    assert!(matches!(
        server.listen().await,
        Err(ServerError::NonLoopbackHost(_))
    ));
}

#[tokio::test]
async fn stop_closes_connections_and_clears_state() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut client = connect(&url).await;
    send_json(&mut client, &request(1, "eth_accounts", json!([]))).await;
    let _ = read_json(&mut signer).await;

    server.stop();
    expect_closed(&mut signer).await;
    expect_closed(&mut client).await;
    assert_eq!(server.broker().stats(), BrokerStats::default());
}

#[tokio::test]
async fn coordinator_shutdown_closes_live_connections() {
    let (server, url) = boot_server().await;
    let mut signer = attach_signer(&url, &server).await;
    let mut client = connect(&url).await;
    wait_until(&server, |s| s.clients == 1).await;

    server.shutdown().shutdown();
    expect_closed(&mut signer).await;
    expect_closed(&mut client).await;
    wait_until(&server, |s| s.clients == 0 && !s.signer_connected).await;
}

#[tokio::test]
async fn health_reports_broker_counters() {
    let (server, addr) = boot_with(test_config()).await;
    let url = format!("ws://{addr}/");
    let mut client = connect(&url).await;
    send_json(&mut client, &request(1, "eth_accounts", json!([]))).await;
    wait_until(&server, |s| s.pending_requests == 1).await;

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 1);
    assert_eq!(health["signer_connected"], false);
    assert_eq!(health["pending_requests"], 1);
    assert_eq!(health["outstanding_requests"], 0);
}

#[tokio::test]
async fn root_serves_signer_page() {
    let (_server, addr) = boot_with(test_config()).await;
    let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert!(resp.status().is_success());
    let body = resp.text().await.unwrap();
    assert!(body.contains(SIGNER_HANDSHAKE));
    assert!(body.contains("window.ethereum"));
}
