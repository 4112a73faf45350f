//! Post count endpoint: the synchronous read view over the event store.

use axum::extract::State;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /tweetscount`
///
/// Plain-text count of all stored posts. No caching, no pagination.
pub async fn tweets_count(State(state): State<AppState>) -> Result<String, ApiError> {
    let count = state.store.count_all().await?;
    Ok(format!("Docs count: {}", count))
}
