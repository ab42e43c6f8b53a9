//! Extraction service interface.
//!
//! The orchestrator treats the content-recognition backend as an opaque
//! capability: give it a page subset and the requested kinds, get back a
//! [`BatchResult`]. Backends only have to report failures as
//! [`ServiceError`]; vendor error types never cross this boundary.
//!
//! # Example
//!
//! ```
//! use pdfbatch::service::{ExtractionService, ServiceError};
//! use pdfbatch::{BatchResult, KindSet, SubDocument};
//!
//! struct Echo;
//!
//! impl ExtractionService for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn extract(&self, doc: &SubDocument, _kinds: &KindSet) -> Result<BatchResult, ServiceError> {
//!         Ok(BatchResult::new().with_text(format!("{}\n", doc.range())))
//!     }
//! }
//! ```

pub mod bundle;
mod command;

pub use command::{CommandService, CommandTemplate, TEMPFAIL_EXIT_CODE};

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::model::{BatchResult, KindSet, SubDocument};

/// A backend that turns a page subset into artifacts.
///
/// Implementations must be shareable across threads: the orchestrator runs
/// each call on its own thread so that it can enforce a timeout.
pub trait ExtractionService: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "extraction service"
    }

    /// Extract the requested kinds from one sub-document.
    fn extract(&self, document: &SubDocument, kinds: &KindSet) -> Result<BatchResult, ServiceError>;

    /// Extract with a time limit.
    ///
    /// The orchestrator always calls this method. Services holding resources
    /// outside this process override it to release them once the limit
    /// passes and report [`ServiceErrorKind::Timeout`]. The default ignores
    /// the limit; the orchestrator then stops waiting and drops the late
    /// answer.
    fn extract_within(
        &self,
        document: &SubDocument,
        kinds: &KindSet,
        _timeout: Duration,
    ) -> Result<BatchResult, ServiceError> {
        self.extract(document, kinds)
    }
}

impl<F> ExtractionService for F
where
    F: Fn(&SubDocument, &KindSet) -> Result<BatchResult, ServiceError> + Send + Sync,
{
    fn extract(&self, document: &SubDocument, kinds: &KindSet) -> Result<BatchResult, ServiceError> {
        self(document, kinds)
    }
}

/// Broad category of a service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Transport failure or unreachable backend
    Network,
    /// Rate limit or quota exhausted
    Quota,
    /// The backend rejected the submitted document
    MalformedInput,
    /// The call was stopped at its time limit
    Timeout,
    /// Anything else
    Other,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceErrorKind::Network => write!(f, "network error"),
            ServiceErrorKind::Quota => write!(f, "quota exceeded"),
            ServiceErrorKind::MalformedInput => write!(f, "malformed input"),
            ServiceErrorKind::Timeout => write!(f, "timed out"),
            ServiceErrorKind::Other => write!(f, "service error"),
        }
    }
}

/// Error reported by an extraction service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {reason}")]
pub struct ServiceError {
    /// Failure category
    pub kind: ServiceErrorKind,
    /// Human-readable reason
    pub reason: String,
}

impl ServiceError {
    /// Create a service error.
    pub fn new(kind: ServiceErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a [`ServiceErrorKind::Network`] error.
    pub fn network(reason: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Network, reason)
    }

    /// Create a [`ServiceErrorKind::Quota`] error.
    pub fn quota(reason: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Quota, reason)
    }

    /// Create a [`ServiceErrorKind::MalformedInput`] error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::MalformedInput, reason)
    }

    /// Create a [`ServiceErrorKind::Timeout`] error.
    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Timeout, reason)
    }

    /// Create a [`ServiceErrorKind::Other`] error.
    pub fn other(reason: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Other, reason)
    }
}
