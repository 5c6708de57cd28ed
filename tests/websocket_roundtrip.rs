//! Realtime transport against a local tokio-tungstenite server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use guild_chat::common::{
    Action, ChatMessage, ConnectionState, Conversation, NetworkCommand, NetworkEvent, UserId,
};
use guild_chat::config::{AppConfig, RetryConfig};
use guild_chat::network::transport::Inbound;
use guild_chat::network::{ChatClient, Transport, WsConnector};
use guild_chat::session::SessionContext;
use guild_chat::ClientError;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

fn retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_backoff_ms: 10,
        max_backoff_ms: 10,
    }
}

/// Accepts one connection, reports its path and auth header, echoes every
/// text frame and then pushes one message from another user.
async fn spawn_server() -> (String, oneshot::Receiver<(String, Option<String>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut seen = None;
        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let auth = request
                .headers()
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            seen = Some((request.uri().path().to_string(), auth));
            Ok(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        let _ = seen_tx.send(seen.unwrap());

        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => {
                    ws.send(Message::Text(text)).await.unwrap();
                    let other = r#"{"sender":"bob","content":"hi alice","timestamp":"2024-05-01T10:00:00Z"}"#;
                    ws.send(Message::text(other)).await.unwrap();
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    (format!("ws://{addr}"), seen_rx)
}

#[tokio::test]
async fn test_send_and_receive_over_websocket() {
    let (url, seen) = spawn_server().await;
    let (events_tx, _events) = mpsc::channel(64);
    let mut transport = Transport::new(
        WsConnector::new(Duration::from_secs(5)),
        &url,
        retry(),
        events_tx,
    );
    let general = Conversation::channel("Server1", "general");

    let generation = transport.open(&general, Some("tok-123")).await.unwrap();
    assert_eq!(
        transport.handle(&general).unwrap().state(),
        ConnectionState::Open
    );
    let (path, auth) = seen.await.unwrap();
    assert_eq!(path, "/ws/channels/Server1/general");
    assert_eq!(auth.as_deref(), Some("Bearer tok-123"));

    let sent = transport
        .send(&general, &UserId::new("alice"), "hello".to_string())
        .await
        .unwrap();
    assert_eq!(sent.sender, "alice");

    // Our echo is suppressed, bob's message comes through.
    let mut received: Vec<ChatMessage> = Vec::new();
    while received.is_empty() {
        let frame = tokio::time::timeout(Duration::from_secs(5), transport.next_frame())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.generation, generation);
        match transport.handle_frame(frame) {
            Inbound::Message(message) => received.push(message),
            Inbound::Echo => {}
            other => panic!("unexpected frame {other:?}"),
        }
    }
    assert_eq!(received[0].sender, "bob");
    assert_eq!(received[0].content, "hi alice");

    assert_eq!(transport.close_all(), 1);
    assert_eq!(transport.open_count(), 0);
}

#[tokio::test]
async fn test_unreachable_server_exhausts_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (events_tx, mut events) = mpsc::channel(64);
    let mut transport = Transport::new(
        WsConnector::new(Duration::from_secs(2)),
        &format!("ws://{addr}"),
        retry(),
        events_tx,
    );
    let thread = Conversation::friend("bob");

    let err = transport.open(&thread, Some("tok")).await.unwrap_err();

    assert!(matches!(err, ClientError::Network(_)));
    assert!(err.is_retryable());
    let failure = transport
        .send(&thread, &UserId::new("alice"), "anyone?".to_string())
        .await
        .unwrap_err();
    assert_eq!(failure.content, "anyone?");

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let guild_chat::common::NetworkEvent::ConnectionState { state, .. } = event {
            states.push(state);
        }
    }
    assert_eq!(states.last(), Some(&ConnectionState::Errored));
    assert_eq!(
        states
            .iter()
            .filter(|state| **state == ConnectionState::Connecting)
            .count(),
        2
    );
}

/// Rejects every handshake with 401 and counts how many were attempted.
async fn spawn_rejecting_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handshakes = Arc::new(AtomicUsize::new(0));
    let counter = handshakes.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let callback = |_: &Request, _: Response| -> Result<Response, ErrorResponse> {
                let mut rejection = ErrorResponse::new(Some("token expired".to_string()));
                *rejection.status_mut() = StatusCode::UNAUTHORIZED;
                Err(rejection)
            };
            let _ = tokio_tungstenite::accept_hdr_async(stream, callback).await;
        }
    });

    (format!("ws://{addr}"), handshakes)
}

#[tokio::test]
async fn test_rejected_handshake_is_auth_error_without_retry() {
    let (url, handshakes) = spawn_rejecting_server().await;
    let (events_tx, _events) = mpsc::channel(64);
    let mut transport = Transport::new(
        WsConnector::new(Duration::from_secs(5)),
        &url,
        RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 10,
        },
        events_tx,
    );
    let general = Conversation::channel("Server1", "general");

    let err = transport.open(&general, Some("expired")).await.unwrap_err();

    assert!(matches!(err, ClientError::Auth(_)));
    assert_eq!(handshakes.load(Ordering::SeqCst), 1);
    assert_eq!(
        transport.handle(&general).unwrap().state(),
        ConnectionState::Errored
    );
}

#[tokio::test]
async fn test_rejected_handshake_expires_session() {
    let (url, handshakes) = spawn_rejecting_server().await;
    let config = AppConfig {
        api_base_url: "http://127.0.0.1:9".to_string(),
        ws_base_url: url,
        request_timeout_secs: 5,
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 10,
        },
        ..AppConfig::default()
    };
    let mut context = SessionContext::in_memory();
    context
        .init("expired".to_string(), UserId::new("alice"))
        .unwrap();
    let (event_tx, mut events) = mpsc::channel(64);
    let (commands, command_rx) = mpsc::channel(8);
    let client = ChatClient::new(
        &config,
        WsConnector::new(Duration::from_secs(5)),
        context,
        event_tx,
        command_rx,
    )
    .unwrap();
    let worker = tokio::spawn(client.run());

    commands
        .send(NetworkCommand::OpenConversation(Conversation::channel(
            "Server1", "general",
        )))
        .await
        .unwrap();

    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        let done = matches!(event, NetworkEvent::Failed { .. });
        seen.push(event);
        if done {
            break;
        }
    }

    let expired = seen
        .iter()
        .position(|event| *event == NetworkEvent::SessionExpired)
        .expect("session should expire");
    assert!(matches!(
        &seen[expired + 1],
        NetworkEvent::Failed {
            action: Action::Connect,
            error: ClientError::Auth(_)
        }
    ));
    assert_eq!(handshakes.load(Ordering::SeqCst), 1);

    drop(commands);
    worker.await.unwrap().unwrap();
}
