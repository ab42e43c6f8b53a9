//! Batch execution: timed service calls and the worker pool.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use super::RunObserver;
use crate::error::{BatchError, Result};
use crate::model::{BatchResult, Document, KindSet, PageRange, SubDocument};
use crate::service::{ExtractionService, ServiceError, ServiceErrorKind};

/// Outcome of one batch as seen by the merger.
pub(crate) type BatchOutcome = std::result::Result<BatchResult, BatchError>;

/// Everything a worker needs to process a batch.
pub(crate) struct BatchContext<'a> {
    pub document: &'a Document,
    pub service: &'a Arc<dyn ExtractionService>,
    pub kinds: &'a KindSet,
    pub timeout: Duration,
    pub observer: &'a dyn RunObserver,
}

impl BatchContext<'_> {
    /// Slice the batch out of the document and submit it.
    pub fn process(&self, index: usize, range: PageRange) -> BatchOutcome {
        self.observer.batch_started(index, range);

        let sub_document = self
            .document
            .slice(range)
            .map_err(|e| BatchError::Slice(e.to_string()))?;

        log::debug!(
            "{}: submitting {} bytes to {}",
            range,
            sub_document.size(),
            self.service.name()
        );
        call_with_timeout(self.service, sub_document, self.kinds, self.timeout)
    }
}

/// Run one service call on its own thread and wait at most `timeout` for it.
///
/// The service is handed the same limit through
/// [`ExtractionService::extract_within`] and may stop its own work there. A
/// call still running when the limit passes is abandoned: its thread keeps
/// running until the service returns, and the late result is discarded.
pub(crate) fn call_with_timeout(
    service: &Arc<dyn ExtractionService>,
    document: SubDocument,
    kinds: &KindSet,
    timeout: Duration,
) -> BatchOutcome {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let service = Arc::clone(service);
    let kinds = kinds.clone();
    let range = document.range();

    thread::Builder::new()
        .name(format!("pdfbatch-{}-{}", range.start(), range.end()))
        .spawn(move || {
            let result = service.extract_within(&document, &kinds, timeout);
            // The receiver is gone if the call timed out.
            let _ = tx.send(result);
        })
        .map_err(|e| {
            BatchError::Service(ServiceError::other(format!(
                "cannot start extraction thread: {}",
                e
            )))
        })?;

    match rx.recv_timeout(timeout) {
        Ok(Err(e)) if e.kind == ServiceErrorKind::Timeout => {
            log::warn!("{}: {}", range, e.reason);
            Err(BatchError::Timeout(timeout))
        }
        Ok(result) => result.map_err(BatchError::from),
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("{}: no answer after {:?}, abandoning call", range, timeout);
            Err(BatchError::Timeout(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(BatchError::WorkerLost),
    }
}

/// Process `ranges` on `workers` threads and hand outcomes to `on_ready`
/// strictly in plan order.
///
/// The calling thread slices the document and dispatches at most `workers`
/// sub-documents at a time; workers only talk to the service. Outcomes that
/// arrive early wait in an index-addressed buffer until every earlier batch
/// has been handed over. When `stop_after_failure` is set, batches after a
/// batch known to have failed are not dispatched. An error from `on_ready`
/// ends the run and is returned.
pub(crate) fn run_pool<F>(
    ctx: &BatchContext<'_>,
    ranges: &[PageRange],
    workers: usize,
    stop_after_failure: bool,
    mut on_ready: F,
) -> Result<()>
where
    F: FnMut(usize, PageRange, BatchOutcome) -> Result<()>,
{
    let total = ranges.len();
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, SubDocument)>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, BatchOutcome)>();

    let service = ctx.service;
    let kinds = ctx.kinds;
    let timeout = ctx.timeout;
    let observer = ctx.observer;

    thread::scope(|scope| {
        for _ in 0..workers.min(total) {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();

            scope.spawn(move || {
                for (index, sub_document) in job_rx.iter() {
                    observer.batch_started(index, sub_document.range());
                    let outcome = call_with_timeout(service, sub_document, kinds, timeout);
                    if result_tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        let mut slots: Vec<Option<BatchOutcome>> = (0..total).map(|_| None).collect();
        let mut next_dispatch = 0;
        let mut next_flush = 0;
        let mut in_flight = 0;
        // Batches after this index are not dispatched.
        let mut stop_at = usize::MAX;

        loop {
            while in_flight < workers && next_dispatch < total {
                let index = next_dispatch;
                next_dispatch += 1;
                if index > stop_at {
                    continue;
                }

                match ctx.document.slice(ranges[index]) {
                    Ok(sub_document) => {
                        log::debug!("{}: dispatching {} bytes", ranges[index], sub_document.size());
                        if job_tx.send((index, sub_document)).is_err() {
                            slots[index] = Some(Err(BatchError::WorkerLost));
                            continue;
                        }
                        in_flight += 1;
                    }
                    Err(e) => {
                        observer.batch_started(index, ranges[index]);
                        slots[index] = Some(Err(BatchError::Slice(e.to_string())));
                        if stop_after_failure {
                            stop_at = stop_at.min(index);
                        }
                    }
                }
            }

            while next_flush < total {
                let Some(outcome) = slots[next_flush].take() else {
                    break;
                };
                on_ready(next_flush, ranges[next_flush], outcome)?;
                next_flush += 1;
            }

            // Nothing in flight means every batch has been dispatched or skipped.
            if in_flight == 0 {
                break;
            }

            let Ok((index, outcome)) = result_rx.recv() else {
                break;
            };
            in_flight -= 1;
            if outcome.is_err() && stop_after_failure {
                stop_at = stop_at.min(index);
            }
            slots[index] = Some(outcome);
        }
        drop(job_tx);

        // Gaps are left only by batches that were never dispatched.
        for index in next_flush..total {
            let outcome = slots[index].take().unwrap_or(Err(BatchError::WorkerLost));
            on_ready(index, ranges[index], outcome)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::inspect_bytes;
    use crate::model::all_kinds;
    use crate::testutil::sample_pdf;
    use std::sync::Mutex;

    fn range(start: u32, end: u32) -> PageRange {
        PageRange::new(start, end).unwrap()
    }

    fn service<F>(f: F) -> Arc<dyn ExtractionService>
    where
        F: Fn(&SubDocument, &KindSet) -> std::result::Result<BatchResult, ServiceError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(f)
    }

    #[test]
    fn test_call_returns_result() {
        let service = service(|doc, _| Ok(BatchResult::new().with_text(doc.range().to_string())));
        let doc = SubDocument::from_bytes(range(1, 2), Vec::new());

        let result = call_with_timeout(&service, doc, &all_kinds(), Duration::from_secs(5)).unwrap();
        assert_eq!(result.text(), Some("pages 1-2"));
    }

    #[test]
    fn test_call_times_out() {
        let service = service(|_, _| {
            thread::sleep(Duration::from_secs(2));
            Ok(BatchResult::new())
        });
        let doc = SubDocument::from_bytes(range(1, 1), Vec::new());

        let started = std::time::Instant::now();
        let err = call_with_timeout(&service, doc, &all_kinds(), Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, BatchError::Timeout(d) if d == Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_call_service_error() {
        let service = service(|_, _| Err(ServiceError::network("connection reset")));
        let doc = SubDocument::from_bytes(range(1, 1), Vec::new());

        let err = call_with_timeout(&service, doc, &all_kinds(), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, BatchError::Service(e) if e.reason == "connection reset"));
    }

    #[test]
    fn test_call_panicking_service() {
        let service = service(|_, _| panic!("service crashed"));
        let doc = SubDocument::from_bytes(range(1, 1), Vec::new());

        let err = call_with_timeout(&service, doc, &all_kinds(), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, BatchError::WorkerLost));
    }

    /// Stops itself at the time limit, the way a process-backed service does.
    struct SelfLimiting;

    impl ExtractionService for SelfLimiting {
        fn extract(&self, _: &SubDocument, _: &KindSet) -> std::result::Result<BatchResult, ServiceError> {
            Ok(BatchResult::new())
        }

        fn extract_within(
            &self,
            _: &SubDocument,
            _: &KindSet,
            timeout: Duration,
        ) -> std::result::Result<BatchResult, ServiceError> {
            Err(ServiceError::timeout(format!("stopped after {:?}", timeout)))
        }
    }

    #[test]
    fn test_call_stopped_by_service_is_timeout() {
        let service: Arc<dyn ExtractionService> = Arc::new(SelfLimiting);
        let doc = SubDocument::from_bytes(range(1, 1), Vec::new());

        let err = call_with_timeout(&service, doc, &all_kinds(), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, BatchError::Timeout(d) if d == Duration::from_secs(5)));
    }

    /// Runs `ranges` through the pool and reports, per batch, `None` for a
    /// success or whether the failure was a slicing failure.
    fn pool_outcomes(
        ranges: &[PageRange],
        stop_after_failure: bool,
        calls: &Arc<Mutex<Vec<PageRange>>>,
    ) -> Vec<Option<bool>> {
        let document = inspect_bytes(&sample_pdf(3)).unwrap();
        let recorded = Arc::clone(calls);
        let service = service(move |doc, _| {
            recorded.lock().unwrap().push(doc.range());
            Ok(BatchResult::new().with_text("x"))
        });
        let kinds = all_kinds();
        let observer = super::super::NoopObserver;
        let ctx = BatchContext {
            document: &document,
            service: &service,
            kinds: &kinds,
            timeout: Duration::from_secs(5),
            observer: &observer,
        };

        let mut seen = Vec::new();
        run_pool(&ctx, ranges, 2, stop_after_failure, |index, _, outcome| {
            assert_eq!(index, seen.len());
            seen.push(outcome.err().map(|e| matches!(e, BatchError::Slice(_))));
            Ok(())
        })
        .unwrap();
        seen
    }

    #[test]
    fn test_pool_slice_failure_is_batch_outcome() {
        let ranges = [range(1, 1), range(4, 5), range(2, 2), range(3, 3)];

        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = pool_outcomes(&ranges, false, &calls);
        assert_eq!(seen, vec![None, Some(true), None, None]);
        let mut called = calls.lock().unwrap().clone();
        called.sort();
        assert_eq!(called, vec![range(1, 1), range(2, 2), range(3, 3)]);
    }

    #[test]
    fn test_pool_slice_failure_stops_dispatch() {
        let ranges = [range(1, 1), range(4, 5), range(2, 2), range(3, 3)];

        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = pool_outcomes(&ranges, true, &calls);
        assert_eq!(seen[..2], [None, Some(true)]);
        assert_eq!(*calls.lock().unwrap(), vec![range(1, 1)]);
    }
}
