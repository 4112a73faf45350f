//! Prometheus metrics helpers for the Chirp system.
//!
//! This module provides centralized metrics initialization and common metric
//! definitions used across Chirp components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use chirp_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     use metrics::counter;
//!     counter!("ingest_posts_total").increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`ingest_`, `store_`, `hub_`, `forward_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: use sparingly to avoid cardinality explosion

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed, instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port.
/// This spawns a background task and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

/// Register descriptions for common metrics used across Chirp.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Stream Ingestion Metrics
    // =========================================================================

    describe_counter!("ingest_posts_total", "Total posts received from upstream");
    describe_counter!(
        "ingest_parse_errors_total",
        "Upstream lines that failed to parse as JSON"
    );
    describe_gauge!(
        "ingest_running",
        "Whether the stream ingestor is currently running (1=yes, 0=no)"
    );

    // =========================================================================
    // Store Metrics
    // =========================================================================

    describe_counter!("store_appends_total", "Posts appended to the event store");
    describe_counter!(
        "store_append_errors_total",
        "Posts dropped because the store append failed"
    );

    // =========================================================================
    // Live Fan-out Metrics
    // =========================================================================

    describe_gauge!("hub_subscribers", "Currently connected live subscribers");
    describe_counter!(
        "hub_lagged_total",
        "Broadcast messages dropped because a subscriber lagged"
    );

    // =========================================================================
    // Batch Forwarder Metrics
    // =========================================================================

    describe_counter!("forward_batches_total", "Batches submitted downstream");
    describe_counter!("forward_posts_total", "Posts submitted downstream");
    describe_counter!(
        "forward_errors_total",
        "Batch submissions that failed (network or non-2xx)"
    );
    describe_counter!(
        "forward_truncated_total",
        "Posts dropped from a batch by the max-batch cap"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    // Ensure metrics are initialized exactly once for all tests
    static INIT: Once = Once::new();

    fn ensure_metrics_init() {
        INIT.call_once(|| {
            let _ = try_init_metrics();
        });
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        let handle1 = try_init_metrics();
        let handle2 = try_init_metrics();
        // At most one should succeed
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_register_common_metrics_does_not_panic() {
        ensure_metrics_init();
        // Should be idempotent
        register_common_metrics();
        register_common_metrics();
    }
}
