//! Batch orchestration.
//!
//! Drives one extraction run: slices each planned range out of the
//! document, submits it to the [`ExtractionService`] under a timeout, and
//! folds the answers into a [`MergedResult`] in plan order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pdfbatch::{inspect_file, all_kinds, BatchConfig, CommandService, Orchestrator, RunOutcome};
//!
//! let service = CommandService::from_command_line("extract-pdf {input} {output}")?;
//! let orchestrator = Orchestrator::new(Arc::new(service), BatchConfig::new().lenient());
//!
//! let doc = inspect_file("scan.pdf")?;
//! match orchestrator.run_document(&doc, &all_kinds())? {
//!     RunOutcome::Complete(merged) => println!("{} bytes of text", merged.text().len()),
//!     RunOutcome::Partial(partial) => eprintln!("failed: {:?}", partial.failed_ranges()),
//! }
//! # Ok::<(), pdfbatch::Error>(())
//! ```

mod options;
mod worker;

pub use options::{BatchConfig, DEFAULT_TIMEOUT};

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::error::{BatchError, Error, Result};
use crate::model::{BatchFailure, Document, KindSet, MergedResult, PageRange, PartialResult};
use crate::plan::{plan, BatchPlan};
use crate::service::ExtractionService;
use worker::{BatchContext, BatchOutcome};

/// How a run ended when it was not aborted.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every batch was merged
    Complete(MergedResult),
    /// Some batches failed (lenient mode only)
    Partial(PartialResult),
}

impl RunOutcome {
    /// Check if every batch was merged.
    pub fn is_complete(&self) -> bool {
        matches!(self, RunOutcome::Complete(_))
    }

    /// Artifacts merged so far, complete or not.
    pub fn merged(&self) -> &MergedResult {
        match self {
            RunOutcome::Complete(merged) => merged,
            RunOutcome::Partial(partial) => &partial.merged,
        }
    }

    /// Failed batches; empty for a complete run.
    pub fn failures(&self) -> &[BatchFailure] {
        match self {
            RunOutcome::Complete(_) => &[],
            RunOutcome::Partial(partial) => &partial.failures,
        }
    }

    /// Consume the outcome, keeping the merged artifacts.
    pub fn into_merged(self) -> MergedResult {
        match self {
            RunOutcome::Complete(merged) => merged,
            RunOutcome::Partial(partial) => partial.merged,
        }
    }
}

/// Progress notifications for a run.
///
/// Every method has an empty default. `batch_started` may be called from
/// worker threads and in any order; the other batch events arrive on the
/// orchestrating thread in plan order. `run_finished` is not called when
/// a strict run aborts.
pub trait RunObserver: Send + Sync {
    /// The run is about to start.
    fn run_started(&self, _plan: &BatchPlan) {}

    /// A batch is being sliced or submitted.
    fn batch_started(&self, _index: usize, _range: PageRange) {}

    /// A batch was merged.
    fn batch_succeeded(&self, _index: usize, _range: PageRange) {}

    /// A batch failed.
    fn batch_failed(&self, _index: usize, _range: PageRange, _cause: &BatchError) {}

    /// The run ended with an outcome.
    fn run_finished(&self, _outcome: &RunOutcome) {}
}

struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Runs batch plans against an extraction service.
pub struct Orchestrator {
    service: Arc<dyn ExtractionService>,
    config: BatchConfig,
    observer: Arc<dyn RunObserver>,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(service: Arc<dyn ExtractionService>, config: BatchConfig) -> Self {
        Self {
            service,
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Register a progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Plan `document` with the configured batch size and run the plan.
    pub fn run_document(&self, document: &Document, kinds: &KindSet) -> Result<RunOutcome> {
        self.config.validate()?;
        let plan = plan(document.page_count(), self.config.max_batch_pages)?;
        self.run(document, &plan, kinds)
    }

    /// Run `plan` over `document`, requesting `kinds` from the service.
    ///
    /// In strict mode the first failing batch in plan order aborts the run
    /// with [`Error::BatchExtractionFailed`]. In lenient mode failures are
    /// collected and the run ends with [`RunOutcome::Partial`].
    pub fn run(&self, document: &Document, plan: &BatchPlan, kinds: &KindSet) -> Result<RunOutcome> {
        self.config.validate()?;
        if kinds.is_empty() {
            return Err(Error::InvalidConfig(
                "no artifact kinds requested".to_string(),
            ));
        }
        plan.check_covers(document.page_count())?;

        let strict = !self.config.continue_on_batch_failure;
        log::info!(
            "Extracting {} pages in {} batches with {} ({} mode, concurrency {})",
            plan.page_count(),
            plan.len(),
            self.service.name(),
            if strict { "strict" } else { "lenient" },
            self.config.concurrency
        );

        let started = Instant::now();
        self.observer.run_started(plan);

        let ctx = BatchContext {
            document,
            service: &self.service,
            kinds,
            timeout: self.config.timeout,
            observer: self.observer.as_ref(),
        };
        let mut merged = MergedResult::new(kinds.clone());
        let mut failures: Vec<BatchFailure> = Vec::new();
        let observer = self.observer.as_ref();

        let mut settle = |index: usize, range: PageRange, outcome: BatchOutcome| -> Result<()> {
            match outcome {
                Ok(batch) => {
                    merged.merge(range, batch)?;
                    log::info!("{}: merged ({}/{})", range, index + 1, plan.len());
                    observer.batch_succeeded(index, range);
                    Ok(())
                }
                Err(cause) => {
                    observer.batch_failed(index, range, &cause);
                    if strict {
                        log::error!("{}: {}", range, cause);
                        return Err(Error::BatchExtractionFailed { range, cause });
                    }
                    log::warn!("{}: {}; continuing with the next batch", range, cause);
                    failures.push(BatchFailure { range, cause });
                    Ok(())
                }
            }
        };

        if self.config.is_concurrent() && plan.len() > 1 {
            worker::run_pool(&ctx, plan.ranges(), self.config.concurrency, strict, &mut settle)?;
        } else {
            for (index, &range) in plan.iter().enumerate() {
                if index > 0 && !self.config.inter_batch_delay.is_zero() {
                    thread::sleep(self.config.inter_batch_delay);
                }
                let outcome = ctx.process(index, range);
                settle(index, range, outcome)?;
            }
        }

        let outcome = if failures.is_empty() {
            RunOutcome::Complete(merged)
        } else {
            RunOutcome::Partial(PartialResult { merged, failures })
        };

        log::info!(
            "Run finished in {:.2?}: {} batches merged, {} failed",
            started.elapsed(),
            outcome.merged().stats().batch_count,
            outcome.failures().len()
        );
        self.observer.run_finished(&outcome);
        Ok(outcome)
    }
}
