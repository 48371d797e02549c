//! Plain-text reports: chunk listings, structure explanations and batch
//! summaries.

mod batch;
mod chunks;
mod explain;

pub use batch::{BatchSummary, ChunkJobOutcome};
pub use chunks::{
    chunk_report_filename, write_chunk_report, ChunkEntry, ChunkReport, CHUNK_REPORT_TITLE,
};
pub use explain::{ExplainLimits, ExplainReport};
