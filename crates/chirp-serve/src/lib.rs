//! Chirp Serve - the HTTP/WebSocket face of the pipeline.
//!
//! This crate provides the web surface of Chirp: a static index page, the
//! diagnostic routes (`/health`, `/env`, `/tweetscount`), and the `/ws`
//! live channel that pushes each ingested post to connected clients.
//!
//! # Architecture
//!
//! - **AppState**: shared application state (store handle, hub, config),
//!   constructed once at startup and injected into every handler - no
//!   ambient globals.
//! - **Routes**: endpoint handlers grouped by concern.
//! - **ws**: the WebSocket subscriber loop with its per-send timeout.

mod error;
mod routes;
mod state;
mod ws;

pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::{AppState, Config};
