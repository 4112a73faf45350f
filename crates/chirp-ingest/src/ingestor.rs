//! The ingestor: drains stamped posts from a source channel into the store
//! and the live fan-out hub.
//!
//! Persistence is at-most-once and best-effort: a failed append is logged
//! and the post is dropped, never re-queued, and ingestion continues with
//! the next post. The hub broadcast happens before the append completes, so
//! live delivery and durability race by design.

use crate::hub::Hub;
use crate::store::PostStore;
use chirp_core::Post;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Default capacity of the source-to-ingestor channel (posts buffered while
/// the store append lags the stream).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Statistics from an ingestor run.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Posts taken off the source channel.
    pub received: usize,

    /// Posts successfully appended to the store.
    pub appended: usize,

    /// Posts dropped because the append failed.
    pub append_errors: usize,
}

/// Drains posts from a source into the store and, optionally, the hub.
pub struct Ingestor {
    store: Arc<dyn PostStore>,
    hub: Option<Hub>,
}

impl Ingestor {
    /// Create an ingestor writing to `store`, with no live fan-out.
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store, hub: None }
    }

    /// Attach a hub; every ingested post is also broadcast to it.
    pub fn with_hub(mut self, hub: Hub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Consume posts until the source channel closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<Post>) -> IngestStats {
        let mut stats = IngestStats::default();

        while let Some(post) = rx.recv().await {
            stats.received += 1;
            self.handle(post, &mut stats).await;
        }

        tracing::info!(
            "Ingestor finished: {} received, {} appended, {} append errors",
            stats.received, stats.appended, stats.append_errors
        );
        stats
    }

    /// Process one post: broadcast to live subscribers, then append.
    ///
    /// The broadcast is queued before the append is awaited; no ordering is
    /// guaranteed between live delivery and the store write.
    async fn handle(&self, post: Post, stats: &mut IngestStats) {
        if let Some(ref hub) = self.hub {
            hub.broadcast(post.clone());
        }

        match self.store.append(&post).await {
            Ok(()) => {
                stats.appended += 1;
                counter!("store_appends_total").increment(1);
            }
            Err(e) => {
                stats.append_errors += 1;
                counter!("store_append_errors_total").increment(1);
                tracing::error!("Failed to append post: {}", e);
                // Continue with the next post
            }
        }
    }
}
