//! Data model shared by the inspector, planner, and orchestrator.
//!
//! Documents and page ranges describe the input; batch results and the
//! merged result describe what comes back from the extraction service.

mod artifact;
mod document;
mod merged;
mod range;

pub use artifact::{all_kinds, parse_kinds, ArtifactKind, ArtifactPayload, BatchResult, KindSet};
pub use document::{Document, SubDocument};
pub use merged::{
    prefixed_name, BatchFailure, FileCollection, MergeStats, MergedResult, MetadataRecord,
    NamedFile, PartialResult, TextSegment,
};
pub use range::PageRange;
