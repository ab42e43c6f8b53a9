//! Error types for pdfbatch.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::model::PageRange;
use crate::service::ServiceError;

/// Result type alias for pdfbatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while inspecting, planning, or running an extraction.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input cannot be inspected as a PDF document.
    #[error("Document unreadable: {reason}")]
    DocumentUnreadable {
        /// What made the document unusable
        reason: String,
    },

    /// Planner preconditions were violated.
    #[error("Invalid batch plan: {0}")]
    InvalidPlan(String),

    /// Orchestrator configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// One batch failed and the run was aborted.
    #[error("Extraction failed for {range}: {cause}")]
    BatchExtractionFailed {
        /// Page range of the failing batch
        range: PageRange,
        /// Why the batch failed
        cause: BatchError,
    },

    /// A returned artifact bundle could not be decoded.
    #[error("Archive error: {0}")]
    Archive(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unreadable(reason: impl Into<String>) -> Self {
        Error::DocumentUnreadable {
            reason: reason.into(),
        }
    }

    /// Page range this error is attached to, if any.
    pub fn range(&self) -> Option<PageRange> {
        match self {
            Error::BatchExtractionFailed { range, .. } => Some(*range),
            _ => None,
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::unreadable("document is encrypted"),
            _ => Error::unreadable(err.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Archive(err.to_string())
    }
}

/// Why a single batch could not be merged.
#[derive(Error, Debug, Clone)]
pub enum BatchError {
    /// The page subset could not be written as a standalone document.
    #[error("sub-document could not be built: {0}")]
    Slice(String),

    /// The extraction service reported an error.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The extraction service did not answer in time.
    #[error("extraction timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The extraction call ended without producing a result (the service panicked).
    #[error("extraction worker exited without a result")]
    WorkerLost,
}
