//! Robustness tests for the presence server.
//!
//! These tests verify the daemon handles edge cases and error conditions gracefully:
//! - Malformed handshake replies
//! - Binary and control frames
//! - Payloads after the handshake
//! - Rapid connect/disconnect
//! - Many concurrent participants
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use huddle_protocol::{ServerMessage, INVALID_LIMIT};
use huddled::registry::{spawn_registry, RegistryHandle, RegistryStatus};
use huddled::server::PresenceServer;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

const TEST_TICK: Duration = Duration::from_millis(20);
const RECV_TIMEOUT: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let registry = spawn_registry(TEST_TICK);
        let cancel_token = CancellationToken::new();

        let server = PresenceServer::new(listener, registry.clone(), cancel_token.clone());
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            registry,
            cancel_token,
        }
    }

    async fn connect(&self) -> TestClient {
        let (ws, _) = timeout(RECV_TIMEOUT, connect_async(format!("ws://{}", self.addr)))
            .await
            .expect("connect timed out")
            .expect("websocket connect");
        TestClient { ws }
    }

    async fn wait_for(&self, predicate: impl Fn(&RegistryStatus) -> bool) -> RegistryStatus {
        timeout(RECV_TIMEOUT, async {
            loop {
                if let Some(status) = self.registry.status().await {
                    if predicate(&status) {
                        return status;
                    }
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .expect("registry never reached the expected state")
    }

    fn shutdown(self) {
        self.cancel_token.cancel();
    }
}

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::text(text.to_string())).await.unwrap();
    }

    /// Next text payload, skipping join/leave broadcasts.
    async fn recv_direct(&mut self) -> ServerMessage {
        loop {
            let frame = timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for a payload")
                .expect("stream ended")
                .expect("transport error");

            if let Message::Text(text) = frame {
                let msg: ServerMessage = serde_json::from_str(text.as_str()).unwrap();
                let raw: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                let event = raw.get("event").and_then(|e| e.as_str());
                if !matches!(event, Some("user_join" | "user_leave")) {
                    return msg;
                }
            }
        }
    }

    async fn claim_name(&mut self, name: &str) {
        assert_eq!(self.recv_direct().await, ServerMessage::uname_request());
        self.send_text(&format!(r#"{{"uname":"{name}"}}"#)).await;
    }
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[tokio::test]
async fn test_malformed_json_reprompts_for_name() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    assert_eq!(client.recv_direct().await, ServerMessage::uname_request());
    client.send_text("{not json").await;

    let reply = client.recv_direct().await;
    assert!(reply.as_error().is_some(), "expected an error, got {reply:?}");
    assert_eq!(client.recv_direct().await, ServerMessage::uname_request());

    // Connection still usable
    client.send_text(r#"{"uname":"alice"}"#).await;
    assert_eq!(client.recv_direct().await, ServerMessage::ulimit_request());

    server.shutdown();
}

#[tokio::test]
async fn test_wrong_field_and_empty_name_rejected() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    for bad in [r#"{"name":"alice"}"#, r#"{"uname":42}"#, r#"{"uname":"   "}"#, ""] {
        assert_eq!(client.recv_direct().await, ServerMessage::uname_request());
        client.send_text(bad).await;
        let reply = client.recv_direct().await;
        assert!(reply.as_error().is_some(), "{bad:?} should be rejected");
    }

    let status = server.registry.status().await.unwrap();
    assert_eq!(status.count, 0);

    server.shutdown();
}

#[tokio::test]
async fn test_non_integer_limit_rejected() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;
    client.claim_name("alice").await;

    for bad in [r#"{"ulimit":"3"}"#, r#"{"ulimit":2.5}"#, r#"{"ulimit":null}"#, "[]"] {
        assert_eq!(client.recv_direct().await, ServerMessage::ulimit_request());
        client.send_text(bad).await;
        assert_eq!(client.recv_direct().await.as_error(), Some(INVALID_LIMIT));
    }

    // Integral float is accepted
    assert_eq!(client.recv_direct().await, ServerMessage::ulimit_request());
    client.send_text(r#"{"ulimit":4.0}"#).await;
    let status = server.wait_for(|s| s.limit.is_some()).await;
    assert_eq!(status.limit.map(|l| l.get()), Some(4));

    server.shutdown();
}

#[tokio::test]
async fn test_binary_frame_accepted_as_text() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    assert_eq!(client.recv_direct().await, ServerMessage::uname_request());
    client
        .ws
        .send(Message::binary(br#"{"uname":"alice"}"#.to_vec()))
        .await
        .unwrap();

    assert_eq!(client.recv_direct().await, ServerMessage::ulimit_request());
    server.wait_for(|s| s.members == vec!["alice".to_string()]).await;

    server.shutdown();
}

#[tokio::test]
async fn test_ping_during_handshake_ignored() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    assert_eq!(client.recv_direct().await, ServerMessage::uname_request());
    client.ws.send(Message::Ping(Vec::new().into())).await.unwrap();
    client.send_text(r#"{"uname":"alice"}"#).await;

    assert_eq!(client.recv_direct().await, ServerMessage::ulimit_request());

    server.shutdown();
}

#[tokio::test]
async fn test_payload_after_handshake_ignored() {
    let server = TestServer::spawn().await;

    let mut alice = server.connect().await;
    alice.claim_name("alice").await;
    assert_eq!(alice.recv_direct().await, ServerMessage::ulimit_request());
    alice.send_text(r#"{"ulimit":3}"#).await;
    server.wait_for(|s| s.limit.is_some()).await;

    // Chatter while active changes nothing
    alice.send_text(r#"{"uname":"mallory"}"#).await;
    alice.send_text(r#"{"ulimit":10}"#).await;
    alice.send_text("garbage").await;

    let mut bob = server.connect().await;
    bob.claim_name("bob").await;

    let status = server.wait_for(|s| s.count == 2).await;
    assert_eq!(status.limit.map(|l| l.get()), Some(3));
    assert_eq!(status.members, vec!["alice".to_string(), "bob".to_string()]);

    server.shutdown();
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_disconnect_before_name_leaves_no_trace() {
    let server = TestServer::spawn().await;

    let mut client = server.connect().await;
    assert_eq!(client.recv_direct().await, ServerMessage::uname_request());
    drop(client);

    sleep(Duration::from_millis(50)).await;
    let status = server.registry.status().await.unwrap();
    assert_eq!(status.count, 0);
    assert!(status.most_recent_joiner.is_none());

    server.shutdown();
}

#[tokio::test]
async fn test_disconnect_during_limit_prompt_removes_participant() {
    let server = TestServer::spawn().await;

    let mut alice = server.connect().await;
    alice.claim_name("alice").await;
    assert_eq!(alice.recv_direct().await, ServerMessage::ulimit_request());
    alice.ws.close(None).await.unwrap();

    let status = server.wait_for(|s| s.most_recent_leaver.is_some()).await;
    assert_eq!(status.count, 0);
    assert!(status.limit.is_none());

    // Next arrival is treated as first again
    let mut bob = server.connect().await;
    bob.claim_name("bob").await;
    assert_eq!(bob.recv_direct().await, ServerMessage::ulimit_request());

    server.shutdown();
}

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;

    for _ in 0..20 {
        let client = server.connect().await;
        drop(client);
    }

    // Server still accepts and serves new connections
    let mut client = server.connect().await;
    assert_eq!(client.recv_direct().await, ServerMessage::uname_request());

    server.shutdown();
}

#[tokio::test]
async fn test_many_concurrent_participants() {
    let server = TestServer::spawn().await;

    let mut first = server.connect().await;
    first.claim_name("user-0").await;
    assert_eq!(first.recv_direct().await, ServerMessage::ulimit_request());
    first.send_text(r#"{"ulimit":50}"#).await;
    server.wait_for(|s| s.limit.is_some()).await;

    let mut clients = Vec::new();
    for i in 1..20 {
        let mut client = server.connect().await;
        client.claim_name(&format!("user-{i}")).await;
        clients.push(client);
    }

    let status = server.wait_for(|s| s.count == 20).await;
    assert_eq!(status.members.len(), 20);

    drop(clients);
    let status = server.wait_for(|s| s.count == 1).await;
    assert_eq!(status.members, vec!["user-0".to_string()]);

    server.shutdown();
}
