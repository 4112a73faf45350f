//! WebSocket live channel.
//!
//! Each connected client gets a hub subscription and receives one
//! JSON-serialized post per message. Delivery is best-effort: a subscriber
//! that lags the broadcast channel loses the overflowed posts, and a write
//! that fails or exceeds the send timeout tears down that connection only.
//! There is no acknowledgment and no history replay on connect.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// How long one socket write may take before the subscriber is dropped.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// `GET /ws` - upgrade and hand the socket to the subscriber loop.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pump hub broadcasts to one client until it disconnects or stalls.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut rx = state.hub.subscribe();
    gauge!("hub_subscribers").set(state.hub.subscriber_count() as f64);
    tracing::debug!(
        "WebSocket subscriber connected ({} total)",
        state.hub.subscriber_count()
    );

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            broadcast = rx.recv() => {
                let post = match broadcast {
                    Ok(post) => post,
                    Err(RecvError::Lagged(skipped)) => {
                        // Slow consumer: the overflowed posts are gone.
                        counter!("hub_lagged_total").increment(skipped);
                        tracing::debug!("Subscriber lagged, dropped {} posts", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let text = match serde_json::to_string(post.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to serialize post for subscriber: {}", e);
                        continue;
                    }
                };

                let send = sender.send(Message::Text(text.into()));
                match tokio::time::timeout(SEND_TIMEOUT, send).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!("Subscriber write failed, dropping: {}", e);
                        break;
                    }
                    Err(_) => {
                        tracing::debug!("Subscriber write timed out, dropping");
                        break;
                    }
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients have nothing to say to us; ignore the rest.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(rx);
    gauge!("hub_subscribers").set(state.hub.subscriber_count() as f64);
    tracing::debug!("WebSocket subscriber disconnected");
}
