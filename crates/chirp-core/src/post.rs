//! The [`Post`] type: one ingested record plus its arrival timestamp.
//!
//! The upstream payload schema is owned by the source and passed through
//! unmodified; Chirp adds exactly one field, `arrived_at`, stamped once at
//! ingestion and never mutated afterwards.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A single ingested post.
///
/// Identity is whatever the upstream assigns, if any; Chirp does not
/// deduplicate. `arrived_at` values are non-decreasing with ingestion order
/// because every post is stamped by the single source task before it enters
/// the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Arrival time in Unix milliseconds, stamped at ingestion.
    pub arrived_at: u64,

    /// The upstream record, opaque and unvalidated.
    pub payload: serde_json::Value,
}

impl Post {
    /// Stamp an upstream payload with the current arrival time.
    pub fn ingest(payload: serde_json::Value) -> Self {
        Self {
            arrived_at: now_ms(),
            payload,
        }
    }

    /// Construct a post with an explicit arrival time.
    pub fn with_arrival(arrived_at: u64, payload: serde_json::Value) -> Self {
        Self {
            arrived_at,
            payload,
        }
    }

    /// Parse a raw upstream line and stamp it.
    ///
    /// Returns an error if the line is not valid JSON; blank-line keep-alives
    /// are the caller's concern.
    pub fn from_line(line: &str) -> Result<Self> {
        let payload: serde_json::Value = serde_json::from_str(line)?;
        Ok(Self::ingest(payload))
    }

    /// Serialize the payload (without the arrival stamp) back to JSON text.
    pub fn payload_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ingest_stamps_current_time() {
        let before = now_ms();
        let post = Post::ingest(json!({"text": "hello"}));
        let after = now_ms();
        assert!(post.arrived_at >= before);
        assert!(post.arrived_at <= after);
    }

    #[test]
    fn test_ingestion_order_is_non_decreasing() {
        let a = Post::ingest(json!({"n": 1}));
        let b = Post::ingest(json!({"n": 2}));
        assert!(b.arrived_at >= a.arrived_at);
    }

    #[test]
    fn test_from_line_valid_json() {
        let post = Post::from_line(r#"{"text":"prague","user":{"name":"x"}}"#).unwrap();
        assert_eq!(post.payload["text"], "prague");
        assert_eq!(post.payload["user"]["name"], "x");
    }

    #[test]
    fn test_from_line_rejects_garbage() {
        assert!(Post::from_line("not json").is_err());
    }

    #[test]
    fn test_payload_passthrough_roundtrip() {
        // Payload must survive unmodified, including fields we don't know about.
        let payload = json!({"id": 42, "nested": {"a": [1, 2, 3]}, "emoji": "🐦"});
        let post = Post::with_arrival(1_000, payload.clone());
        let text = post.payload_json().unwrap();
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_serde_includes_arrival_stamp() {
        let post = Post::with_arrival(1234, json!({"x": 1}));
        let v = serde_json::to_value(&post).unwrap();
        assert_eq!(v["arrived_at"], 1234);
        assert_eq!(v["payload"]["x"], 1);
    }
}
