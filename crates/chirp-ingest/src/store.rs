//! Event store façade over ClickHouse.
//!
//! The store is append-only and queryable by arrival-time range. Durability
//! is best-effort: a failed append is logged by the caller and the post is
//! dropped, never re-queued. Reconnection behavior is the driver's concern,
//! not orchestrated here.

use crate::{Error, Result};
use async_trait::async_trait;
use chirp_core::Post;
use clickhouse::{Client, Row};
use serde::{Deserialize, Serialize};

/// Configuration for the ClickHouse-backed store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// ClickHouse server URL (e.g., "http://localhost:8123")
    pub url: String,

    /// Database name
    pub database: String,

    /// Table name for posts
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: "chirp".to_string(),
            table: "posts".to_string(),
        }
    }
}

/// Append-only, time-range-queryable post storage.
///
/// `query_range` is half-open: it returns every post with
/// `start_ms <= arrived_at < end_ms`, in the backend's natural order.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Persist one post.
    async fn append(&self, post: &Post) -> Result<()>;

    /// Total number of stored posts.
    async fn count_all(&self) -> Result<u64>;

    /// All posts with `start_ms <= arrived_at < end_ms`, order unspecified.
    async fn query_range(&self, start_ms: u64, end_ms: u64) -> Result<Vec<Post>>;
}

/// Row structure matching the ClickHouse posts table.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
struct PostRow {
    arrived_at: u64,
    payload: String,
}

impl TryFrom<&Post> for PostRow {
    type Error = Error;

    fn try_from(post: &Post) -> Result<Self> {
        Ok(Self {
            arrived_at: post.arrived_at,
            payload: serde_json::to_string(&post.payload)?,
        })
    }
}

impl TryFrom<PostRow> for Post {
    type Error = Error;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post::with_arrival(
            row.arrived_at,
            serde_json::from_str(&row.payload)?,
        ))
    }
}

/// ClickHouse-backed post store.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: Client,
    table: String,
}

impl ClickHouseStore {
    /// Create a new store for the given ClickHouse instance.
    pub fn new(config: &StoreConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        tracing::info!(
            "ClickHouse store initialized: url={}, database={}, table={}",
            config.url, config.database, config.table
        );

        Self {
            client,
            table: config.table.clone(),
        }
    }

    /// Create the posts table if it does not exist.
    ///
    /// Called once at startup; a failure here is reported to the caller so
    /// the operator sees it, but the caller may choose to continue and let
    /// appends fail individually.
    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                arrived_at UInt64,
                payload String
            ) ENGINE = MergeTree ORDER BY arrived_at",
            self.table
        );
        self.client.query(&ddl).execute().await?;
        Ok(())
    }
}

#[async_trait]
impl PostStore for ClickHouseStore {
    async fn append(&self, post: &Post) -> Result<()> {
        let row = PostRow::try_from(post)?;
        let mut insert = self.client.insert(&self.table)?;
        insert.write(&row).await?;
        insert.end().await?;
        Ok(())
    }

    async fn count_all(&self) -> Result<u64> {
        let query = format!("SELECT count() FROM {}", self.table);
        let count: u64 = self.client.query(&query).fetch_one().await?;
        Ok(count)
    }

    async fn query_range(&self, start_ms: u64, end_ms: u64) -> Result<Vec<Post>> {
        let query = format!(
            "SELECT arrived_at, payload FROM {} WHERE arrived_at >= ? AND arrived_at < ?",
            self.table
        );
        let rows: Vec<PostRow> = self
            .client
            .query(&query)
            .bind(start_ms)
            .bind(end_ms)
            .fetch_all()
            .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            match Post::try_from(row) {
                Ok(post) => posts.push(post),
                Err(e) => {
                    // A corrupt payload shouldn't sink the whole batch
                    tracing::warn!("Skipping unparsable stored post: {}", e);
                }
            }
        }
        Ok(posts)
    }
}

/// In-memory post store.
///
/// Used by the pipeline tests and handy for running the server without a
/// ClickHouse instance. Not durable.
#[derive(Default)]
pub struct MemoryStore {
    posts: tokio::sync::Mutex<Vec<Post>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn append(&self, post: &Post) -> Result<()> {
        self.posts.lock().await.push(post.clone());
        Ok(())
    }

    async fn count_all(&self) -> Result<u64> {
        Ok(self.posts.lock().await.len() as u64)
    }

    async fn query_range(&self, start_ms: u64, end_ms: u64) -> Result<Vec<Post>> {
        Ok(self
            .posts
            .lock()
            .await
            .iter()
            .filter(|p| p.arrived_at >= start_ms && p.arrived_at < end_ms)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(arrived_at: u64, n: u64) -> Post {
        Post::with_arrival(arrived_at, json!({ "n": n }))
    }

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.database, "chirp");
        assert_eq!(config.table, "posts");
    }

    #[test]
    fn test_post_row_roundtrip() {
        let original = Post::with_arrival(42, json!({"text": "hi", "deep": {"a": 1}}));
        let row = PostRow::try_from(&original).unwrap();
        assert_eq!(row.arrived_at, 42);
        let back = Post::try_from(row).unwrap();
        assert_eq!(back, original);
    }

    #[tokio::test]
    async fn test_count_matches_appends() {
        let store = MemoryStore::new();
        assert_eq!(store.count_all().await.unwrap(), 0);

        for i in 0..5 {
            store.append(&post(i * 100, i)).await.unwrap();
        }
        assert_eq!(store.count_all().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_query_range_half_open_boundaries() {
        let store = MemoryStore::new();
        store.append(&post(100, 1)).await.unwrap();
        store.append(&post(200, 2)).await.unwrap();
        store.append(&post(300, 3)).await.unwrap();

        // start is inclusive, end is exclusive
        let hits = store.query_range(100, 300).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|p| p.arrived_at < 300));

        // exact-match start boundary
        let hits = store.query_range(300, 301).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].arrived_at, 300);
    }

    #[tokio::test]
    async fn test_query_range_empty_range() {
        let store = MemoryStore::new();
        store.append(&post(100, 1)).await.unwrap();

        assert!(store.query_range(100, 100).await.unwrap().is_empty());
        assert!(store.query_range(500, 600).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_then_query_returns_exactly_that_post() {
        // Ingest at t=0, query [0, 2000) at a later time: exactly that post.
        let store = MemoryStore::new();
        let p = post(0, 7);
        store.append(&p).await.unwrap();

        let hits = store.query_range(0, 2000).await.unwrap();
        assert_eq!(hits, vec![p]);
    }
}
