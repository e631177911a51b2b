//! services/kiosk/src/web/ws_handler.rs
//!
//! This is the entry point and control loop for a kiosk screen's WebSocket.
//! Screen input becomes flow events; every state the flow passes through is
//! pushed back to the screen.

use crate::web::{
    protocol::{ClientMessage, ServerMessage, StateView},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use bytes::Bytes;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use sitepass_core::CheckinEvent;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// A phone-camera card photo, base64-encoded, fits comfortably.
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!("Screen {} connected.", connection_id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Push the current state, then every change ---
    let mut updates = app_state.session.subscribe();
    let current = updates.borrow_and_update().clone();
    if send_message(&ws_sender, &ServerMessage::State(StateView::from(&current)))
        .await
        .is_err()
    {
        error!("Failed to send the initial state to screen {}.", connection_id);
        return;
    }

    let token = CancellationToken::new();
    let forward_task = {
        let ws_sender = ws_sender.clone();
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = updates.borrow_and_update().clone();
                        let message = ServerMessage::State(StateView::from(&state));
                        if send_message(&ws_sender, &message).await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    };

    // --- 2. Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(text.as_str(), &app_state, &ws_sender, connection_id).await;
            }
            Some(Ok(Message::Binary(data))) => {
                dispatch(&app_state, card_scanned(data), connection_id);
            }
            Some(Ok(Message::Close(_))) => {
                info!("Screen {} sent close message.", connection_id);
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("Screen {} socket error: {}", connection_id, e);
                break;
            }
            None => {
                info!("Screen {} disconnected.", connection_id);
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    // An in-flight dispatch keeps running; the session outlives the screen.
    token.cancel();
    if let Err(e) = forward_task.await {
        error!("State forwarding for screen {} panicked: {}", connection_id, e);
    }
    info!("WebSocket for screen {} closed.", connection_id);
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    ws_sender: &WsSender,
    connection_id: Uuid,
) {
    let event = match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => client_msg.into_event(),
        Err(e) => {
            warn!("Screen {} sent an unreadable message: {}", connection_id, e);
            let _ = send_message(
                ws_sender,
                &ServerMessage::Error {
                    message: format!("Unrecognized message: {}", e),
                },
            )
            .await;
            return;
        }
    };

    match event {
        Ok(event) => dispatch(app_state, event, connection_id),
        Err(e) => {
            warn!("Screen {} sent a card photo that is not base64: {}", connection_id, e);
            let _ = send_message(
                ws_sender,
                &ServerMessage::Error {
                    message: "The card photo could not be decoded.".to_string(),
                },
            )
            .await;
        }
    }
}

fn card_scanned(data: Bytes) -> CheckinEvent {
    CheckinEvent::ScanCard {
        image: data.to_vec(),
    }
}

/// Hands the event to the session and runs it in the background.
///
/// The session is claimed before this returns, so input arriving while the
/// work is still running is dropped here rather than queued.
fn dispatch(app_state: &AppState, event: CheckinEvent, connection_id: Uuid) {
    match app_state.session.try_dispatch(event) {
        Some(work) => {
            tokio::spawn(async move {
                let state = work.await;
                debug!("Dispatch from screen {} settled in '{}'.", connection_id, state.name());
            });
        }
        None => {
            debug!("Dropped input from screen {} while busy.", connection_id);
        }
    }
}

async fn send_message(ws_sender: &WsSender, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize a server message: {}", e);
            return Ok(());
        }
    };
    ws_sender.lock().await.send(Message::Text(json.into())).await
}
