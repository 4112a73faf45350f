//! Application state and configuration.

use std::sync::Arc;
use std::time::Duration;

use chirp_core::{DEFAULT_FORWARD_MAX_BATCH, DEFAULT_FORWARD_WINDOW_MS};
use chirp_ingest::hub::DEFAULT_HUB_CAPACITY;
use chirp_ingest::ingestor::DEFAULT_CHANNEL_CAPACITY;
use chirp_ingest::{Hub, PostStore};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// ClickHouse connection URL.
    pub clickhouse_url: String,

    /// ClickHouse database name.
    pub clickhouse_database: String,

    /// ClickHouse table name.
    pub clickhouse_table: String,

    /// Upstream streaming endpoint (ingestion disabled when unset).
    pub stream_url: Option<String>,

    /// Bearer token for the upstream API.
    pub stream_token: Option<String>,

    /// Keyword filter for the upstream subscription.
    pub keywords: Vec<String>,

    /// Batch forward target URL (forwarding disabled when unset).
    pub forward_url: Option<String>,

    /// Forward window / tick period.
    pub forward_window: Duration,

    /// Maximum posts per forwarded batch.
    pub forward_max_batch: usize,

    /// Live fan-out channel capacity.
    pub hub_capacity: usize,

    /// Source-to-ingestor channel capacity.
    pub channel_capacity: usize,

    /// Whether `GET /env` dumps the process environment.
    /// Sensitive; leave off anywhere that isn't a local sandbox.
    pub expose_env: bool,

    /// Metrics HTTP server port (0 disables).
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional and default for local development:
    /// - `CHIRP_BIND_ADDR` (default "0.0.0.0:8080")
    /// - `CLICKHOUSE_URL` (default "http://localhost:8123")
    /// - `CLICKHOUSE_DATABASE` (default "chirp")
    /// - `CLICKHOUSE_TABLE` (default "posts")
    /// - `CHIRP_STREAM_URL` (ingestion disabled when unset)
    /// - `CHIRP_STREAM_TOKEN`
    /// - `CHIRP_KEYWORDS` (comma-separated, default "nodejs")
    /// - `CHIRP_FORWARD_URL` (forwarding disabled when unset)
    /// - `CHIRP_FORWARD_WINDOW_MS` (default 60000)
    /// - `CHIRP_FORWARD_MAX_BATCH` (default 5000)
    /// - `CHIRP_HUB_CAPACITY` (default 1024)
    /// - `CHIRP_CHANNEL_CAPACITY` (default 1024)
    /// - `CHIRP_EXPOSE_ENV` (default false)
    /// - `CHIRP_METRICS_PORT` (default 9090, 0 disables)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("CHIRP_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let clickhouse_url =
            std::env::var("CLICKHOUSE_URL").unwrap_or_else(|_| "http://localhost:8123".to_string());

        let clickhouse_database =
            std::env::var("CLICKHOUSE_DATABASE").unwrap_or_else(|_| "chirp".to_string());

        let clickhouse_table =
            std::env::var("CLICKHOUSE_TABLE").unwrap_or_else(|_| "posts".to_string());

        let stream_url = std::env::var("CHIRP_STREAM_URL").ok().filter(|s| !s.is_empty());
        let stream_token = std::env::var("CHIRP_STREAM_TOKEN").ok().filter(|s| !s.is_empty());

        let keywords: Vec<String> = std::env::var("CHIRP_KEYWORDS")
            .unwrap_or_else(|_| "nodejs".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let forward_url = std::env::var("CHIRP_FORWARD_URL").ok().filter(|s| !s.is_empty());

        let forward_window = Duration::from_millis(parse_env(
            "CHIRP_FORWARD_WINDOW_MS",
            DEFAULT_FORWARD_WINDOW_MS,
        )?);
        let forward_max_batch =
            parse_env("CHIRP_FORWARD_MAX_BATCH", DEFAULT_FORWARD_MAX_BATCH)?;
        let hub_capacity = parse_env("CHIRP_HUB_CAPACITY", DEFAULT_HUB_CAPACITY)?;
        let channel_capacity = parse_env("CHIRP_CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY)?;
        let metrics_port = parse_env("CHIRP_METRICS_PORT", 9090u16)?;

        let expose_env = std::env::var("CHIRP_EXPOSE_ENV")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        tracing::info!(
            bind_addr = %bind_addr,
            clickhouse_url = %clickhouse_url,
            stream = stream_url.is_some(),
            forward = forward_url.is_some(),
            keyword_count = keywords.len(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            clickhouse_url,
            clickhouse_database,
            clickhouse_table,
            stream_url,
            stream_token,
            keywords,
            forward_url,
            forward_window,
            forward_max_batch,
            hub_capacity,
            channel_capacity,
            expose_env,
            metrics_port,
        })
    }
}

/// Parse an env var as `T`, falling back to `default` when unset.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Event store handle.
    pub store: Arc<dyn PostStore>,

    /// Live fan-out hub.
    pub hub: Hub,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Create application state from configuration and an already-built store.
    pub fn new(config: Config, store: Arc<dyn PostStore>) -> Self {
        let hub = Hub::new(config.hub_capacity);
        Self {
            store,
            hub,
            config: Arc::new(config),
        }
    }
}
