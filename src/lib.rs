//! # pdfbatch
//!
//! Batch orchestration for page-limited PDF extraction services.
//!
//! Content-recognition backends often refuse documents above a page limit.
//! This library splits a PDF into page-range batches, submits each batch as
//! a standalone sub-document, and merges the returned text, images, tables,
//! and metadata back into one result in page order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pdfbatch::{all_kinds, inspect_file, plan, BatchConfig, CommandService, Orchestrator};
//!
//! fn main() -> pdfbatch::Result<()> {
//!     // Count pages once
//!     let doc = inspect_file("scan.pdf")?;
//!
//!     // Split into batches of at most 100 pages
//!     let plan = plan(doc.page_count(), 100)?;
//!
//!     // Run every batch through an external extractor
//!     let service = CommandService::from_command_line("extract-pdf {input} {output}")?;
//!     let orchestrator = Orchestrator::new(Arc::new(service), BatchConfig::default());
//!     let outcome = orchestrator.run(&doc, &plan, &all_kinds())?;
//!
//!     println!("{}", outcome.merged().text());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Page-count inspection**: parse once, reject unreadable input early
//! - **Deterministic planning**: contiguous ranges, never above the limit
//! - **Ordered merging**: text stays in page order whatever the completion order
//! - **Collision-free files**: image and table names prefixed by batch start page
//! - **Strict or lenient runs**: abort on the first failure or collect a partial result
//! - **Timeouts and worker pool**: each service call bounded, optional concurrency

pub mod archive;
pub mod error;
pub mod header;
pub mod inspect;
pub mod layout;
pub mod model;
pub mod orchestrator;
pub mod plan;
pub mod service;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use error::{BatchError, Error, Result};
pub use header::PdfHeader;
pub use inspect::{inspect_bytes, inspect_file, inspect_reader};
pub use layout::OutputLayout;
pub use model::{
    all_kinds, parse_kinds, ArtifactKind, ArtifactPayload, BatchFailure, BatchResult, Document,
    FileCollection, KindSet, MergeStats, MergedResult, MetadataRecord, NamedFile, PageRange,
    PartialResult, SubDocument,
};
pub use orchestrator::{BatchConfig, Orchestrator, RunObserver, RunOutcome};
pub use plan::{plan, BatchPlan, DEFAULT_MAX_BATCH_PAGES};
pub use service::{CommandService, ExtractionService, ServiceError, ServiceErrorKind};

use std::path::Path;
use std::sync::Arc;

/// Inspect, plan, and run a PDF file in one call.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pdfbatch::{extract_file, all_kinds, BatchConfig, CommandService};
///
/// let service = Arc::new(CommandService::from_command_line("extract-pdf {input} {output}")?);
/// let outcome = extract_file("scan.pdf", service, BatchConfig::new().lenient(), &all_kinds())?;
/// println!("{} failed batches", outcome.failures().len());
/// # Ok::<(), pdfbatch::Error>(())
/// ```
pub fn extract_file<P: AsRef<Path>>(
    path: P,
    service: Arc<dyn ExtractionService>,
    config: BatchConfig,
    kinds: &KindSet,
) -> Result<RunOutcome> {
    let doc = inspect_file(path)?;
    Orchestrator::new(service, config).run_document(&doc, kinds)
}
