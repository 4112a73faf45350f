//! Core types and shared utilities for the Chirp pipeline.
//!
//! This crate provides:
//! - The [`Post`] type shared by every pipeline stage
//! - Prometheus metrics helpers
//! - Shared error types

mod error;
mod post;
pub mod metrics;

/// Default batch-forward window in milliseconds: each tick forwards the
/// posts that arrived in the last 60 seconds.
pub const DEFAULT_FORWARD_WINDOW_MS: u64 = 60_000;

/// Default maximum number of posts forwarded in a single batch.
pub const DEFAULT_FORWARD_MAX_BATCH: usize = 5_000;

pub use error::{Error, Result};
pub use post::{Post, now_ms};
