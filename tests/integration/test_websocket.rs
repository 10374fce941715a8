//! Integration tests for the WebSocket view event stream.
//!
//! These tests validate connection handling, event broadcasting to several
//! clients, and that HTTP intents show up on the stream.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;
use workbench_app::{
    create_router, App, AppState, AttemptError, BackoffCaller, Config, GenerateContentRequest,
    GenerateContentResponse, GenerationTransport, LocalAuthProvider, Page, RetryPolicy,
    SessionManager, SessionState, ViewEvent,
};
use workbench_store::{MemoryStore, ProjectGateway};

/// Generator that answers every prompt with the same materials list.
#[derive(Debug)]
struct FixedTransport;

#[async_trait]
impl GenerationTransport for FixedTransport {
    async fn generate(
        &self,
        _request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AttemptError> {
        Ok(GenerateContentResponse::from_text(
            r#"{"materials":["4x4 posts"],"tools":["Post hole digger"]}"#,
        ))
    }
}

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn test_state() -> AppState {
    let gateway = ProjectGateway::new(Arc::new(MemoryStore::new()), "ws-app");
    let caller = BackoffCaller::new(Arc::new(FixedTransport), RetryPolicy::default());
    let sessions = SessionManager::new(Arc::new(LocalAuthProvider), Some("ws-user".into()));
    AppState::new(Config::default(), App::new(gateway, caller, sessions))
}

/// Spawns the test server and returns the WebSocket URL.
async fn spawn_test_server(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let ws_url = format!("ws://{addr}/ws");

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (ws_url, handle)
}

/// Connects a WebSocket client to the given URL.
async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next text message and parses it as a `ViewEvent`.
/// Automatically handles ping frames by responding with pong.
async fn receive_event(client: &mut WsClient) -> ViewEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

/// Receives events until one named `name` arrives.
async fn receive_until(client: &mut WsClient, name: &str) -> ViewEvent {
    loop {
        let event = receive_event(client).await;
        if event.event_name() == name {
            return event;
        }
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

/// Tests that a client receives the current view on connection.
#[tokio::test]
async fn test_client_receives_connected_event_on_connect() {
    let (ws_url, _handle) = spawn_test_server(test_state()).await;

    let mut client = connect_client(&ws_url).await;
    let event = receive_event(&mut client).await;

    let ViewEvent::Connected(payload) = event else {
        panic!("Expected Connected event, got: {event:?}");
    };
    assert_eq!(payload.view.visible, Page::Home);
    assert_eq!(payload.view.login_label, "Login");
}

/// Tests that the connected event reflects intents made before connecting.
#[tokio::test]
async fn test_connected_event_contains_current_view() {
    let state = test_state();
    state.app.start().await;
    state.app.navigate(Page::Configurator, None).await;
    let (ws_url, _handle) = spawn_test_server(state).await;

    let mut client = connect_client(&ws_url).await;
    let ViewEvent::Connected(payload) = receive_event(&mut client).await else {
        panic!("Expected Connected event");
    };
    assert_eq!(payload.view.visible, Page::Configurator);
    assert_eq!(payload.view.login_label, "Logout");
}

/// Tests that a client can close the connection cleanly.
#[tokio::test]
async fn test_client_close() {
    let (ws_url, _handle) = spawn_test_server(test_state()).await;

    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    client.close(None).await.expect("Failed to close");
}

// ============================================================================
// Broadcast Tests
// ============================================================================

/// Tests that every connected client sees the same navigation.
#[tokio::test]
async fn test_navigation_broadcast_to_all_clients() {
    let state = test_state();
    let app = Arc::clone(&state.app);
    let (ws_url, _handle) = spawn_test_server(state).await;

    let mut first = connect_client(&ws_url).await;
    let mut second = connect_client(&ws_url).await;
    receive_event(&mut first).await;
    receive_event(&mut second).await;

    app.navigate(Page::Configurator, None).await;

    for client in [&mut first, &mut second] {
        let event = receive_event(client).await;
        let ViewEvent::Navigated(payload) = event else {
            panic!("Expected Navigated event, got: {event:?}");
        };
        assert_eq!(payload.page, Page::Configurator);

        let ViewEvent::Rendered(rendered) = receive_event(client).await else {
            panic!("Expected Rendered event");
        };
        assert_eq!(rendered.page, Page::Configurator);
    }
}

/// Tests that HTTP intents produce session and status events.
#[tokio::test]
async fn test_api_triggers_websocket_events() {
    let (ws_url, _handle) = spawn_test_server(test_state()).await;

    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await; // Consume connected event

    let http_url = ws_url.replace("ws://", "http://").replace("/ws", "");
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{http_url}/api/session/login"))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let ViewEvent::SessionChanged(payload) = receive_until(&mut client, "session_changed").await
    else {
        panic!("Expected SessionChanged event");
    };
    assert_eq!(
        payload.session,
        SessionState::Authenticated {
            uid: "ws-user".into()
        }
    );
    assert_eq!(payload.login_label, "Logout");

    let response = http
        .post(format!("{http_url}/api/navigate"))
        .json(&serde_json::json!({ "page": "instructions" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let ViewEvent::Status(banner) = receive_until(&mut client, "status").await else {
        panic!("Expected Status event");
    };
    assert!(banner.is_error);
    assert_eq!(
        banner.message,
        "Cannot navigate: No Project ID provided. Redirecting to home."
    );
}

/// Tests that a save streams the materials render with the generated lists.
#[tokio::test]
async fn test_submit_streams_materials_render() {
    let state = test_state();
    state.app.start().await;
    let (ws_url, _handle) = spawn_test_server(state).await;

    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    let http_url = ws_url.replace("ws://", "http://").replace("/ws", "");
    let response = reqwest::Client::new()
        .post(format!("{http_url}/api/configurator/submit"))
        .json(&serde_json::json!({
            "projectType": "fence",
            "woodType": "pine",
            "screwLength": "3",
            "height": "48",
            "width": "96",
            "depth": "4"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    loop {
        let ViewEvent::Rendered(payload) = receive_until(&mut client, "rendered").await else {
            panic!("Expected Rendered event");
        };
        if payload.page == Page::Materials {
            assert_eq!(payload.view.materials.materials, vec!["4x4 posts"]);
            assert!(payload.view.materials.show_output);
            break;
        }
    }
}
