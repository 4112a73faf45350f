//! Live upstream stream source.
//!
//! Connects to the configured streaming endpoint over HTTP and reads
//! newline-delimited JSON records, one post per line. The subscription is
//! keyword-filtered via the `track` query parameter and authenticated with
//! an optional bearer token. Blank lines are keep-alives and skipped;
//! unparsable lines are counted and skipped.
//!
//! The stream is unbounded and non-restartable: a connection drop or read
//! error ends the run with an error. Reconnection policy, if any, belongs
//! to whoever supervises the process, not this component.

use super::SourceStats;
use crate::{Error, Result};
use chirp_core::Post;
use futures_util::StreamExt;
use metrics::{counter, gauge};
use tokio::sync::{mpsc, watch};

/// Configuration for the live stream source.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Upstream streaming endpoint URL.
    pub url: String,

    /// Optional bearer token for the upstream API.
    pub token: Option<String>,

    /// Keyword filter; joined with commas into the `track` parameter.
    pub keywords: Vec<String>,
}

/// Live keyword-filtered post stream.
pub struct StreamSource {
    config: StreamConfig,
    client: reqwest::Client,
}

impl StreamSource {
    /// Create a source for the given upstream configuration.
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Connect and pump posts into `tx` until the stream ends, the receiver
    /// is dropped, or `shutdown` flips to true.
    pub async fn run(
        &self,
        tx: mpsc::Sender<Post>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SourceStats> {
        let track = self.config.keywords.join(",");
        tracing::info!(
            "Connecting to upstream stream: url={}, track={}",
            self.config.url, track
        );

        let mut request = self.client.get(&self.config.url).query(&[("track", &track)]);
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        tracing::info!("Upstream stream connected: {}", response.status());
        gauge!("ingest_running").set(1.0);

        let mut stats = SourceStats::default();
        let mut body = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::with_capacity(8192);

        loop {
            let chunk = tokio::select! {
                chunk = body.next() => chunk,
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Stream source shutting down");
                        break;
                    }
                    continue;
                }
            };

            let chunk = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    gauge!("ingest_running").set(0.0);
                    return Err(Error::Http(e));
                }
                None => {
                    // Upstream closed the stream; this source does not reconnect.
                    tracing::warn!("Upstream stream ended");
                    break;
                }
            };

            buf.extend_from_slice(&chunk);

            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line[..pos]);
                if !self.emit_line(line.trim(), &tx, &mut stats).await {
                    gauge!("ingest_running").set(0.0);
                    return Ok(stats);
                }
            }
        }

        gauge!("ingest_running").set(0.0);
        Ok(stats)
    }

    /// Parse, stamp, and forward one line. Returns false when the pipeline
    /// has gone away and the source should stop.
    async fn emit_line(&self, line: &str, tx: &mpsc::Sender<Post>, stats: &mut SourceStats) -> bool {
        if line.is_empty() {
            // Keep-alive
            return true;
        }

        stats.total_records += 1;

        let post = match Post::from_line(line) {
            Ok(post) => post,
            Err(e) => {
                stats.parse_errors += 1;
                counter!("ingest_parse_errors_total").increment(1);
                tracing::warn!("Skipping unparsable upstream record: {}", e);
                return true;
            }
        };

        counter!("ingest_posts_total").increment(1);
        stats.posts_emitted += 1;

        if tx.send(post).await.is_err() {
            tracing::info!("Pipeline channel closed, stopping stream source");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Connection-level behavior needs a live upstream; the line handling is
    // exercised here through emit_line directly.

    fn source() -> StreamSource {
        StreamSource::new(StreamConfig {
            url: "http://localhost:9/stream".to_string(),
            token: None,
            keywords: vec!["prague".to_string()],
        })
    }

    #[tokio::test]
    async fn test_emit_line_stamps_and_sends() {
        let src = source();
        let (tx, mut rx) = mpsc::channel(4);
        let mut stats = SourceStats::default();

        assert!(src.emit_line(r#"{"text":"prague"}"#, &tx, &mut stats).await);
        let post = rx.recv().await.unwrap();
        assert_eq!(post.payload["text"], "prague");
        assert!(post.arrived_at > 0);
        assert_eq!(stats.posts_emitted, 1);
    }

    #[tokio::test]
    async fn test_emit_line_skips_keepalives_and_garbage() {
        let src = source();
        let (tx, mut rx) = mpsc::channel(4);
        let mut stats = SourceStats::default();

        assert!(src.emit_line("", &tx, &mut stats).await);
        assert!(src.emit_line("not json", &tx, &mut stats).await);
        assert!(src.emit_line(r#"{"ok":1}"#, &tx, &mut stats).await);

        assert_eq!(stats.total_records, 2); // keep-alive not counted
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.posts_emitted, 1);
        assert_eq!(rx.recv().await.unwrap().payload["ok"], 1);
    }

    #[tokio::test]
    async fn test_emit_line_stops_when_pipeline_gone() {
        let src = source();
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut stats = SourceStats::default();

        assert!(!src.emit_line(r#"{"x":1}"#, &tx, &mut stats).await);
    }
}
