//! Route definitions.

mod count;
mod env;
mod health;
mod home;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// # Route Structure
///
/// - `GET /` - Static index page
/// - `GET /health` - Liveness probe (fixed literal)
/// - `GET /env` - Process environment dump (gated, off by default)
/// - `GET /tweetscount` - Plain-text count of stored posts
/// - `GET /ws` - WebSocket live channel, one JSON post per message
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/health", get(health::health_check))
        .route("/env", get(env::env_dump))
        .route("/tweetscount", get(count::tweets_count))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
