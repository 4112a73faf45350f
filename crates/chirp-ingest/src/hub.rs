//! Live fan-out hub.
//!
//! Maintains the dynamic set of live subscribers and broadcasts each newly
//! ingested post to all of them. Delivery is volatile: the channel is
//! bounded, a subscriber that falls behind sees `Lagged` and loses the
//! overflowed posts, and nothing is buffered or retried. A broadcast never
//! blocks and never fails the ingestion path.
//!
//! Subscribing returns a plain `broadcast::Receiver`; unsubscribing is
//! dropping it. The subscriber set starts empty and is not persisted.

use chirp_core::Post;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default capacity of the broadcast channel (posts buffered per subscriber
/// before the slowest one starts lagging).
pub const DEFAULT_HUB_CAPACITY: usize = 1024;

/// Broadcast hub for live post delivery.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<Arc<Post>>,
}

impl Hub {
    /// Create a hub with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Register a new subscriber.
    ///
    /// The receiver only observes posts broadcast after this call; there is
    /// no history replay.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Post>> {
        self.tx.subscribe()
    }

    /// Broadcast a post to every current subscriber.
    ///
    /// Returns the number of subscribers the post was queued for. With zero
    /// subscribers this is a no-op: the channel's send error is swallowed.
    pub fn broadcast(&self, post: Post) -> usize {
        self.tx.send(Arc::new(post)).unwrap_or(0)
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}
