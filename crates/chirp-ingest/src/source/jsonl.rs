//! JSONL replay source.
//!
//! Reads posts from a JSONL file (one JSON record per line) and feeds them
//! through the same pipeline as the live stream. Useful for local testing
//! and for replaying captured traffic. Records are stamped with the arrival
//! time at replay, not any timestamp the record carries.

use super::SourceStats;
use crate::Result;
use chirp_core::Post;
use metrics::counter;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// JSONL file post source.
pub struct JsonlSource {
    input: PathBuf,
}

impl JsonlSource {
    /// Create a source reading from the given file.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Replay the file into `tx`, one post per line.
    pub async fn run(&self, tx: mpsc::Sender<Post>) -> Result<SourceStats> {
        let file = File::open(&self.input).await?;
        let mut lines = BufReader::new(file).lines();
        let mut stats = SourceStats::default();

        tracing::info!("Replaying JSONL file: {}", self.input.display());

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            stats.total_records += 1;

            let post = match Post::from_line(line) {
                Ok(post) => post,
                Err(e) => {
                    stats.parse_errors += 1;
                    counter!("ingest_parse_errors_total").increment(1);
                    tracing::warn!("Line {}: JSON parse error: {}", stats.total_records, e);
                    continue;
                }
            };

            stats.posts_emitted += 1;
            if tx.send(post).await.is_err() {
                tracing::info!("Pipeline channel closed, stopping replay");
                break;
            }
        }

        tracing::info!(
            "Replay finished: {} records, {} posts, {} parse errors",
            stats.total_records, stats.posts_emitted, stats.parse_errors
        );
        Ok(stats)
    }
}
