//! Diagnostic environment dump.

use axum::extract::State;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /env`
///
/// Dumps the process environment as plain text, one `KEY=VALUE` per line.
/// Gated behind `CHIRP_EXPOSE_ENV` and returns 404 when disabled: the dump
/// includes credentials and must stay off in production.
pub async fn env_dump(State(state): State<AppState>) -> Result<String, ApiError> {
    if !state.config.expose_env {
        return Err(ApiError::NotFound);
    }

    let mut entries: Vec<String> = std::env::vars()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    entries.sort();

    Ok(entries.join("\n"))
}
