//! Post source adapters.
//!
//! Sources read raw records from their origin, stamp each with an arrival
//! time, and push the resulting [`Post`]s into an `mpsc` channel for the
//! [`Ingestor`](crate::Ingestor) to drain. The channel doubles as the
//! lifecycle contract: a source finishing or erroring closes the channel,
//! which ends the ingestor, and dropping the receiver stops the source.
//!
//! # Available Sources
//!
//! - [`StreamSource`] - live keyword-filtered upstream HTTP stream
//! - [`JsonlSource`] - replays a JSONL file (one record per line)

mod jsonl;
mod stream;

pub use jsonl::JsonlSource;
pub use stream::{StreamConfig, StreamSource};

/// Statistics from running a source to completion.
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    /// Raw records encountered (excluding blank keep-alives).
    pub total_records: usize,

    /// Records successfully parsed, stamped, and handed to the pipeline.
    pub posts_emitted: usize,

    /// Records that failed to parse as JSON and were skipped.
    pub parse_errors: usize,
}
