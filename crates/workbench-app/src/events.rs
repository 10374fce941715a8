//! View events and WebSocket streaming.
//!
//! Every state change of the [`App`](crate::App) is broadcast as a
//! [`ViewEvent`]. Clients connected to `/ws` receive a `connected` event
//! with the current view model, then every following event as JSON:
//!
//! ```json
//! {"event":"navigated","payload":{"page":"materials","seq":4}}
//! ```
//!
//! # Example
//!
//! ```no_run
//! use workbench_app::events::{EventBroadcaster, ViewEvent};
//! use workbench_app::Page;
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(ViewEvent::navigated(Page::Home, 1));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::session::SessionState;
use crate::view::{Page, StatusBanner, ViewModel};

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The view model at connection time.
    pub view: ViewModel,
}

/// Payload for the `navigated` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigatedPayload {
    /// The page now visible.
    pub page: Page,
    /// Navigation sequence number.
    pub seq: u64,
}

/// Payload for the `session_changed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionChangedPayload {
    /// The new session state.
    pub session: SessionState,
    /// Login control label for the new state.
    pub login_label: String,
}

/// Payload for the `rendered` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPayload {
    /// The page whose setup finished.
    pub page: Page,
    /// The view model after rendering.
    pub view: ViewModel,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Events streamed to WebSocket clients.
///
/// Serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// A navigation started.
    Navigated(NavigatedPayload),
    /// A status message was raised.
    Status(StatusBanner),
    /// Sign-in or sign-out completed.
    SessionChanged(SessionChangedPayload),
    /// A page finished its setup and the view model was updated.
    Rendered(RenderedPayload),
}

impl ViewEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(view: ViewModel) -> Self {
        Self::Connected(ConnectedPayload { view })
    }

    /// Creates a `Navigated` event.
    #[must_use]
    pub const fn navigated(page: Page, seq: u64) -> Self {
        Self::Navigated(NavigatedPayload { page, seq })
    }

    /// Creates a `Status` event.
    #[must_use]
    pub const fn status(banner: StatusBanner) -> Self {
        Self::Status(banner)
    }

    /// Creates a `SessionChanged` event.
    #[must_use]
    pub fn session_changed(session: SessionState) -> Self {
        let login_label = session.login_label().to_string();
        Self::SessionChanged(SessionChangedPayload {
            session,
            login_label,
        })
    }

    /// Creates a `Rendered` event.
    #[must_use]
    pub const fn rendered(page: Page, view: ViewModel) -> Self {
        Self::Rendered(RenderedPayload { page, view })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Navigated(_) => "navigated",
            Self::Status(_) => "status",
            Self::SessionChanged(_) => "session_changed",
            Self::Rendered(_) => "rendered",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts view events to all connected WebSocket clients.
///
/// Events are not kept for clients that connect later.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ViewEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event and returns the number of receivers.
    pub fn send(&self, event: ViewEvent) -> usize {
        // Err only means nobody is listening.
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Seconds between heartbeat pings.
const HEARTBEAT_SECS: u64 = 30;

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler for `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_event<S>(sender: &mut S, event: &ViewEvent) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(event = event.event_name(), error = %e, "Failed to serialize event");
            return true;
        }
    };
    sender.send(Message::Text(json)).await.is_ok()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing between the two is lost.
    let mut events = state.app.events().subscribe();
    let connected = ViewEvent::connected(state.app.view().await);

    if !send_event(&mut sender, &connected).await {
        debug!("Client disconnected before receiving connected event");
        return;
    }
    info!("WebSocket client connected, sent current view");

    let mut heartbeat = interval(Duration::from_secs(HEARTBEAT_SECS));
    // The first tick completes immediately.
    heartbeat.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring client message; intents go through the HTTP API");
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket error");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !send_event(&mut sender, &event).await {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Client lagged behind the event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event stream closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!(missed = MAX_MISSED_PONGS, "Client stopped answering pings, closing");
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}
