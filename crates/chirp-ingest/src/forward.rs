//! Timed batch forwarder.
//!
//! On a fixed timer the forwarder queries the store for posts that arrived
//! within the trailing window and submits them downstream as one batch.
//! A failed submission is logged and permanently dropped from the
//! forwarder's perspective; there is no retry, re-queue, or backoff. Batches
//! are capped at a maximum size to bound the payload of a single request.
//!
//! # Known correctness gap
//!
//! The window is always "posts that arrived in the last `window` before
//! now", not "posts not yet sent". There is no persisted watermark, so
//! forwarder downtime, slow ticks, or clock drift can both re-send and drop
//! posts. This reproduces the behavior of the system Chirp models; see
//! DESIGN.md before relying on it for anything where delivery matters.

use crate::store::PostStore;
use crate::{Error, Result};
use async_trait::async_trait;
use chirp_core::{DEFAULT_FORWARD_MAX_BATCH, DEFAULT_FORWARD_WINDOW_MS, Post, now_ms};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Configuration for the batch forwarder.
#[derive(Debug, Clone)]
pub struct ForwardConfig {
    /// Tick period and trailing window size.
    pub window: Duration,

    /// Maximum posts submitted in one batch; overflow is dropped with a log.
    pub max_batch: usize,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_FORWARD_WINDOW_MS),
            max_batch: DEFAULT_FORWARD_MAX_BATCH,
        }
    }
}

/// Destination for forwarded batches.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Submit one batch. `Ok` on acceptance; any error means the batch is
    /// lost (the forwarder never retries).
    async fn submit(&self, posts: &[Post]) -> Result<()>;
}

/// HTTP sink: POSTs the batch form-encoded with a single `tweets` field
/// containing the JSON-serialized array. Any 2xx response is success.
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    /// Create a sink targeting `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl BatchSink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn submit(&self, posts: &[Post]) -> Result<()> {
        let body = serde_json::to_string(posts)?;
        let response = self
            .client
            .post(&self.url)
            .form(&[("tweets", body.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SinkRejected(format!(
                "{} returned {}",
                self.url, status
            )));
        }
        Ok(())
    }
}

/// Outcome of one forwarder tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Window was empty; nothing submitted.
    Empty,
    /// Batch accepted downstream.
    Sent {
        /// Posts submitted.
        count: usize,
    },
    /// Submission failed; the batch is lost.
    Failed,
}

/// Compute the trailing window `[end - window, end)` for a tick.
fn window_bounds(end_ms: u64, window: Duration) -> (u64, u64) {
    let start = end_ms.saturating_sub(window.as_millis() as u64);
    (start, end_ms)
}

/// The batch forwarder.
pub struct Forwarder<S> {
    store: Arc<dyn PostStore>,
    sink: S,
    config: ForwardConfig,
}

impl<S: BatchSink> Forwarder<S> {
    /// Create a forwarder reading from `store` and submitting to `sink`.
    pub fn new(store: Arc<dyn PostStore>, sink: S, config: ForwardConfig) -> Self {
        Self {
            store,
            sink,
            config,
        }
    }

    /// Run ticks at the configured period until `shutdown` flips to true.
    ///
    /// `MissedTickBehavior::Delay` keeps ticks from stacking up behind a
    /// slow submission; a late tick shifts the schedule instead.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.window);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; skip it so the first
        // window has a full period to fill.
        interval.tick().await;

        tracing::info!(
            "Forwarder started: sink={}, window={:?}, max_batch={}",
            self.sink.name(),
            self.config.window,
            self.config.max_batch
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(now_ms()).await {
                        // Store/query trouble: log and wait for the next tick.
                        tracing::error!("Forwarder tick failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Forwarder shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Execute one tick with `end_ms` as "now". Exposed for tests.
    pub async fn tick(&self, end_ms: u64) -> Result<TickOutcome> {
        let (start, end) = window_bounds(end_ms, self.config.window);
        let mut batch = self.store.query_range(start, end).await?;

        if batch.is_empty() {
            tracing::info!("No posts to send for window [{}, {})", start, end);
            return Ok(TickOutcome::Empty);
        }

        if batch.len() > self.config.max_batch {
            let dropped = batch.len() - self.config.max_batch;
            counter!("forward_truncated_total").increment(dropped as u64);
            tracing::warn!(
                "Batch of {} exceeds cap {}, dropping {} posts",
                batch.len(),
                self.config.max_batch,
                dropped
            );
            batch.truncate(self.config.max_batch);
        }

        let count = batch.len();
        match self.sink.submit(&batch).await {
            Ok(()) => {
                counter!("forward_batches_total").increment(1);
                counter!("forward_posts_total").increment(count as u64);
                tracing::info!("Forwarded batch of {} posts", count);
                Ok(TickOutcome::Sent { count })
            }
            Err(e) => {
                counter!("forward_errors_total").increment(1);
                tracing::error!("Batch of {} posts failed to forward: {}", count, e);
                Ok(TickOutcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    fn post(arrived_at: u64, n: u64) -> Post {
        Post::with_arrival(arrived_at, json!({ "n": n }))
    }

    /// Sink that records every submitted batch.
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<Post>>>,
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }
        async fn submit(&self, posts: &[Post]) -> Result<()> {
            self.batches.lock().unwrap().push(posts.to_vec());
            Ok(())
        }
    }

    /// Sink that rejects every batch.
    struct FailingSink;

    #[async_trait]
    impl BatchSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn submit(&self, _posts: &[Post]) -> Result<()> {
            Err(Error::SinkRejected("503 Service Unavailable".to_string()))
        }
    }

    fn forwarder<S: BatchSink>(store: Arc<MemoryStore>, sink: S) -> Forwarder<S> {
        Forwarder::new(
            store,
            sink,
            ForwardConfig {
                window: Duration::from_millis(60_000),
                max_batch: 5_000,
            },
        )
    }

    #[test]
    fn test_window_bounds_trailing() {
        let (start, end) = window_bounds(100_000, Duration::from_millis(60_000));
        assert_eq!((start, end), (40_000, 100_000));
    }

    #[test]
    fn test_window_bounds_saturate_at_epoch() {
        let (start, end) = window_bounds(10, Duration::from_millis(60_000));
        assert_eq!((start, end), (0, 10));
    }

    #[tokio::test]
    async fn test_empty_window_sends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let fwd = forwarder(store, RecordingSink::default());

        let outcome = fwd.tick(100_000).await.unwrap();
        assert_eq!(outcome, TickOutcome::Empty);
        assert!(fwd.sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_sent_once_and_next_window_excludes_it() {
        let store = Arc::new(MemoryStore::new());
        // Three posts inside the first window [40_000, 100_000).
        for (t, n) in [(50_000, 1), (60_000, 2), (99_999, 3)] {
            store.append(&post(t, n)).await.unwrap();
        }
        let fwd = forwarder(store, RecordingSink::default());

        let outcome = fwd.tick(100_000).await.unwrap();
        assert_eq!(outcome, TickOutcome::Sent { count: 3 });

        // Next tick one window later: those posts fall outside the new
        // trailing window and are not re-sent.
        let outcome = fwd.tick(160_000).await.unwrap();
        assert_eq!(outcome, TickOutcome::Empty);

        let batches = fwd.sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[tokio::test]
    async fn test_failed_submission_is_not_retried() {
        let store = Arc::new(MemoryStore::new());
        store.append(&post(90_000, 1)).await.unwrap();
        let fwd = forwarder(store.clone(), FailingSink);

        let outcome = fwd.tick(100_000).await.unwrap();
        assert_eq!(outcome, TickOutcome::Failed);

        // The post is still in the store but a later window won't see it.
        assert_eq!(store.count_all().await.unwrap(), 1);
        let outcome = fwd.tick(200_000).await.unwrap();
        assert_eq!(outcome, TickOutcome::Empty);
    }

    #[tokio::test]
    async fn test_batch_truncated_at_cap() {
        let store = Arc::new(MemoryStore::new());
        for n in 0..10 {
            store.append(&post(90_000 + n, n)).await.unwrap();
        }
        let fwd = Forwarder::new(
            store,
            RecordingSink::default(),
            ForwardConfig {
                window: Duration::from_millis(60_000),
                max_batch: 4,
            },
        );

        let outcome = fwd.tick(100_000).await.unwrap();
        assert_eq!(outcome, TickOutcome::Sent { count: 4 });
        assert_eq!(fwd.sink.batches.lock().unwrap()[0].len(), 4);
    }

    /// Serve `app` on an ephemeral local port and return its base URL.
    async fn spawn_local(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_sink_posts_single_tweets_form_field() {
        use axum::{Form, Router, routing};

        let captured: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
        let fields_slot = captured.clone();
        let app = Router::new().route(
            "/batch",
            routing::post(move |Form(fields): Form<Vec<(String, String)>>| {
                let fields_slot = fields_slot.clone();
                async move {
                    *fields_slot.lock().unwrap() = fields;
                    "ok"
                }
            }),
        );
        let base = spawn_local(app).await;

        let sink = HttpSink::new(format!("{}/batch", base));
        let batch = vec![post(1_000, 1), post(2_000, 2)];
        sink.submit(&batch).await.unwrap();

        let fields = captured.lock().unwrap().clone();
        assert_eq!(fields.len(), 1, "exactly one form field");
        assert_eq!(fields[0].0, "tweets");
        // The field value is the JSON-serialized array of posts.
        let decoded: Vec<Post> = serde_json::from_str(&fields[0].1).unwrap();
        assert_eq!(decoded, batch);
    }

    #[tokio::test]
    async fn test_http_sink_non_2xx_is_rejected() {
        use axum::{Router, http::StatusCode, routing};

        let app = Router::new().route(
            "/batch",
            routing::post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let base = spawn_local(app).await;

        let sink = HttpSink::new(format!("{}/batch", base));
        let err = sink.submit(&[post(1_000, 1)]).await.unwrap_err();
        assert!(matches!(err, Error::SinkRejected(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let fwd = Forwarder::new(
            store,
            RecordingSink::default(),
            ForwardConfig {
                window: Duration::from_secs(3600),
                max_batch: 10,
            },
        );
        let (tx, rx) = watch::channel(false);

        let run = fwd.run(rx);
        tokio::pin!(run);

        tx.send(true).unwrap();
        // Must return promptly instead of waiting out the hour-long tick.
        tokio::time::timeout(Duration::from_secs(1), &mut run)
            .await
            .expect("forwarder did not honor shutdown");
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_sender_dropped() {
        let store = Arc::new(MemoryStore::new());
        let fwd = Forwarder::new(
            store,
            RecordingSink::default(),
            ForwardConfig {
                window: Duration::from_secs(3600),
                max_batch: 10,
            },
        );
        let (tx, rx) = watch::channel(false);
        drop(tx);

        // A vanished sender must read as shutdown, not a spin loop.
        tokio::time::timeout(Duration::from_secs(1), fwd.run(rx))
            .await
            .expect("forwarder did not stop after sender drop");
    }
}
