//! Chirp Serve - the full application entry point.
//!
//! This binary wires the whole pipeline into one process: it constructs the
//! shared application state, spawns the stream ingestor and the batch
//! forwarder as background tasks, and serves the HTTP/WebSocket routes.
//! Ingestion and forwarding are each optional - unset `CHIRP_STREAM_URL` or
//! `CHIRP_FORWARD_URL` and the corresponding task simply isn't started,
//! leaving a read-only diagnostic server.

use axum::http::Request;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use chirp_core::metrics::{init_metrics, start_metrics_server};
use chirp_ingest::{
    ClickHouseStore, ForwardConfig, Forwarder, HttpSink, Ingestor, StoreConfig, StreamConfig,
    StreamSource,
};
use chirp_serve::{AppState, Config, router};

/// Chirp application server.
#[derive(Parser, Debug)]
#[command(name = "chirp-serve")]
#[command(about = "Post stream server: ingest, store, fan out, forward", long_about = None)]
struct Args {
    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load .env file if it exists
    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let bind_addr = config.bind_addr.clone();

    // Initialize metrics
    if config.metrics_port > 0 {
        let handle = init_metrics();
        start_metrics_server(config.metrics_port, handle).await?;
    }

    // Build the store
    let store = ClickHouseStore::new(&StoreConfig {
        url: config.clickhouse_url.clone(),
        database: config.clickhouse_database.clone(),
        table: config.clickhouse_table.clone(),
    });
    if let Err(e) = store.ensure_schema().await {
        tracing::error!("Failed to ensure ClickHouse schema: {}", e);
    }
    let store = Arc::new(store);

    // Create application state
    let state = AppState::new(config, store.clone());
    let config = state.config.clone();

    // Shutdown signal shared by the background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn the stream ingestor
    if let Some(ref stream_url) = config.stream_url {
        let source = StreamSource::new(StreamConfig {
            url: stream_url.clone(),
            token: config.stream_token.clone(),
            keywords: config.keywords.clone(),
        });
        let ingestor = Ingestor::new(store.clone()).with_hub(state.hub.clone());
        let (tx, rx) = mpsc::channel(config.channel_capacity);

        tokio::spawn(async move { ingestor.run(rx).await });

        let source_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            match source.run(tx, source_shutdown).await {
                Ok(stats) => tracing::info!(
                    "Stream source finished: {} posts, {} parse errors",
                    stats.posts_emitted, stats.parse_errors
                ),
                // The source does not reconnect; a supervisor restarts us.
                Err(e) => tracing::error!("Stream source failed: {}", e),
            }
        });
    } else {
        tracing::info!("CHIRP_STREAM_URL not set, ingestion disabled");
    }

    // Spawn the batch forwarder
    if let Some(ref forward_url) = config.forward_url {
        let forwarder = Forwarder::new(
            store.clone(),
            HttpSink::new(forward_url.clone()),
            ForwardConfig {
                window: config.forward_window,
                max_batch: config.forward_max_batch,
            },
        );
        let forward_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { forwarder.run(forward_shutdown).await });
    } else {
        tracing::info!("CHIRP_FORWARD_URL not set, batch forwarding disabled");
    }

    // Build router with middleware
    let app = router(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
