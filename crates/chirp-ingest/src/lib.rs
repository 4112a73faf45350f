//! Chirp ingestion pipeline components.
//!
//! This crate provides the pipeline that moves posts from an upstream
//! stream into the event store, out to live subscribers, and downstream
//! to an external endpoint in timed batches.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────┐     ┌─────────────────┐
//! │ Post Sources │ ──▶ │ Ingestor │ ──▶ │ ClickHouseStore │
//! └──────────────┘     └────┬─────┘     └────────┬────────┘
//!   (live stream,          │                     │
//!    JSONL replay)         ▼                     ▼
//!                     ┌─────────┐          ┌───────────┐
//!                     │   Hub   │          │ Forwarder │ ──▶ external HTTP
//!                     └─────────┘          └───────────┘     endpoint
//!                   live subscribers      (trailing window,
//!                   (drop-if-slow)         no retry)
//! ```
//!
//! The store write and the hub broadcast race by design: live delivery is
//! not gated on durability. Everything is log-and-continue; no error in the
//! pipeline is fatal.

pub mod error;
pub mod forward;
pub mod hub;
pub mod ingestor;
pub mod source;
pub mod store;

pub use error::{Error, Result};

pub use forward::{BatchSink, ForwardConfig, Forwarder, HttpSink, TickOutcome};
pub use hub::Hub;
pub use ingestor::{IngestStats, Ingestor};
pub use source::{JsonlSource, SourceStats, StreamConfig, StreamSource};
pub use store::{ClickHouseStore, MemoryStore, PostStore, StoreConfig};
