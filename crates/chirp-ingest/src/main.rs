//! Chirp headless ingestion daemon.
//!
//! Connects to the upstream post stream (or replays a JSONL capture) and
//! writes every post to ClickHouse, with no HTTP surface beyond the
//! Prometheus endpoint. The full application, including the web routes,
//! live WebSocket fan-out, and batch forwarding, lives in `chirp-serve`.
//!
//! # Usage
//!
//! ```bash
//! # Live ingestion with defaults
//! chirp-ingest --stream-url https://stream.example.com/filter
//!
//! # Replay a captured file
//! chirp-ingest --replay ./captures/posts.jsonl
//! ```
//!
//! SIGINT/SIGTERM stop the source; posts already in flight drain before
//! exit.

use anyhow::{Context, Result};
use chirp_core::metrics::{init_metrics, start_metrics_server};
use chirp_ingest::ingestor::DEFAULT_CHANNEL_CAPACITY;
use chirp_ingest::{
    ClickHouseStore, Ingestor, JsonlSource, StreamConfig, StreamSource, StoreConfig,
};
use clap::Parser;
use metrics::gauge;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

/// Chirp headless ingestion daemon.
#[derive(Parser, Debug)]
#[command(name = "chirp-ingest")]
#[command(about = "Live post ingestion daemon")]
#[command(version)]
struct Args {
    /// Upstream streaming endpoint URL
    #[arg(long, env = "CHIRP_STREAM_URL")]
    stream_url: Option<String>,

    /// Bearer token for the upstream API
    #[arg(long, env = "CHIRP_STREAM_TOKEN")]
    stream_token: Option<String>,

    /// Keyword filter (comma-separated)
    #[arg(long, env = "CHIRP_KEYWORDS", value_delimiter = ',', default_value = "nodejs")]
    keywords: Vec<String>,

    /// Replay a JSONL file instead of connecting upstream
    #[arg(long)]
    replay: Option<PathBuf>,

    /// ClickHouse URL (e.g., http://localhost:8123)
    #[arg(long, env = "CLICKHOUSE_URL", default_value = "http://localhost:8123")]
    clickhouse_url: String,

    /// ClickHouse database name
    #[arg(long, env = "CLICKHOUSE_DATABASE", default_value = "chirp")]
    clickhouse_db: String,

    /// ClickHouse table name
    #[arg(long, env = "CLICKHOUSE_TABLE", default_value = "posts")]
    clickhouse_table: String,

    /// Source channel capacity
    #[arg(long, env = "CHIRP_CHANNEL_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "9090")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive"))
                .add_directive("chirp_ingest=debug".parse().expect("valid directive")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Chirp ingestion daemon starting...");

    // Initialize metrics
    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle).await?;
        gauge!("ingest_running").set(1.0);
    }

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping gracefully...");
        let _ = shutdown_tx.send(true);
    })
    .context("Failed to set Ctrl+C handler")?;

    // Initialize the store
    let store_config = StoreConfig {
        url: args.clickhouse_url.clone(),
        database: args.clickhouse_db.clone(),
        table: args.clickhouse_table.clone(),
    };
    let store = ClickHouseStore::new(&store_config);
    if let Err(e) = store.ensure_schema().await {
        // Appends will fail individually until the table exists; the
        // operator sees both this and those.
        tracing::error!("Failed to ensure ClickHouse schema: {}", e);
    }
    let store = Arc::new(store);

    tracing::info!("Configuration:");
    tracing::info!("  ClickHouse: {}/{}", args.clickhouse_url, args.clickhouse_db);
    tracing::info!("  Keywords: {}", args.keywords.join(","));
    tracing::info!(
        "  Mode: {}",
        if args.replay.is_some() { "replay" } else { "live" }
    );

    // Wire source → ingestor through a bounded channel
    let (tx, rx) = mpsc::channel(args.channel_capacity);
    let ingestor = Ingestor::new(store);
    let ingest_handle = tokio::spawn(async move { ingestor.run(rx).await });

    // Run the source to completion
    let stats = if let Some(replay_path) = args.replay {
        JsonlSource::new(replay_path).run(tx).await?
    } else {
        let url = args
            .stream_url
            .context("--stream-url (or CHIRP_STREAM_URL) is required for live ingestion")?;
        let source = StreamSource::new(StreamConfig {
            url,
            token: args.stream_token,
            keywords: args.keywords,
        });
        source.run(tx, shutdown_rx).await?
    };

    // Source is done; the closed channel drains the ingestor
    let ingest_stats = ingest_handle.await?;

    gauge!("ingest_running").set(0.0);

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("SHUTDOWN COMPLETE");
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Records received:     {}", stats.total_records);
    tracing::info!("Posts emitted:        {}", stats.posts_emitted);
    tracing::info!("Parse errors:         {}", stats.parse_errors);
    tracing::info!("Posts appended:       {}", ingest_stats.appended);
    tracing::info!("Append errors:        {}", ingest_stats.append_errors);

    Ok(())
}
