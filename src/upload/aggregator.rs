use crate::domain::{AggregateUploadError, BatchFailure, ErrorHandler, HandlerError, UploadError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

#[cfg(feature = "metrics")]
use super::metrics::UploadMetrics;

/// Result of attempting one planned batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success {
        batch_index: usize,
        record_count: usize,
        compressed_len: usize,
    },
    Failure(BatchFailure),
}

/// Counters kept for one upload call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub planned_batches: usize,
    pub succeeded_batches: usize,
    pub succeeded_records: usize,
    pub failed_batches: usize,
    pub failed_records: usize,
    pub discarded_outcomes: usize,
}

impl UploadSummary {
    /// Planned batches that never produced an outcome.
    pub fn skipped_batches(&self) -> usize {
        self.planned_batches.saturating_sub(
            self.succeeded_batches + self.failed_batches + self.discarded_outcomes,
        )
    }
}

enum Phase {
    Running,
    Aborted(HandlerError),
    Completed,
}

struct AggregatorState {
    phase: Phase,
    handler: Option<ErrorHandler>,
    pending: Vec<BatchFailure>,
    summary: UploadSummary,
}

/// Fires the abort signal if the error handler panics.
struct CancelOnUnwind<'a>(&'a CancellationToken);

impl Drop for CancelOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("error handler panicked, aborting upload");
            self.0.cancel();
        }
    }
}

/// Applies the caller's failure policy to outcomes as they arrive.
///
/// Scoped to a single upload call. The handler runs under the state lock,
/// so handler invocations never overlap.
pub(crate) struct Aggregator {
    abort: CancellationToken,
    state: Mutex<AggregatorState>,
    #[cfg(feature = "metrics")]
    metrics: Option<UploadMetrics>,
}

impl Aggregator {
    pub(crate) fn new(handler: Option<ErrorHandler>, planned_batches: usize) -> Self {
        Self {
            abort: CancellationToken::new(),
            state: Mutex::new(AggregatorState {
                phase: Phase::Running,
                handler,
                pending: Vec::new(),
                summary: UploadSummary {
                    planned_batches,
                    ..UploadSummary::default()
                },
            }),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: Option<UploadMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Cancelled once the error handler raises.
    pub(crate) fn abort_signal(&self) -> &CancellationToken {
        &self.abort
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    pub(crate) fn report(&self, outcome: UploadOutcome) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.observe(&outcome);
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !matches!(state.phase, Phase::Running) || self.abort.is_cancelled() {
            state.summary.discarded_outcomes += 1;
            debug!(?outcome, "discarding outcome reported after abort");
            return;
        }

        let failure = match outcome {
            UploadOutcome::Success { record_count, .. } => {
                state.summary.succeeded_batches += 1;
                state.summary.succeeded_records += record_count;
                return;
            }
            UploadOutcome::Failure(failure) => failure,
        };

        state.summary.failed_batches += 1;
        state.summary.failed_records += failure.record_count();
        warn!(
            batch_index = failure.batch_index(),
            records = failure.record_count(),
            error = %failure.error(),
            "batch upload failed"
        );

        let Some(handler) = state.handler.as_mut() else {
            state.pending.push(failure);
            return;
        };

        let unwinding = CancelOnUnwind(&self.abort);
        let handled = handler(failure);
        drop(unwinding);

        if let Err(raised) = handled {
            error!(error = %raised, "error handler raised, aborting upload");
            state.phase = Phase::Aborted(raised);
            self.abort.cancel();
        }
    }

    pub(crate) fn summary(&self) -> UploadSummary {
        self.state.lock().summary.clone()
    }

    /// Moves to the terminal state and produces the call's result.
    pub(crate) fn finish(&self) -> Result<(), UploadError> {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);

        match std::mem::replace(&mut state.phase, Phase::Completed) {
            Phase::Aborted(raised) => Err(UploadError::Aborted(raised)),
            Phase::Running if pending.is_empty() => Ok(()),
            Phase::Running => Err(AggregateUploadError::new(pending).into()),
            Phase::Completed => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BatchError;
    use crate::transport::TransportError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failure(batch_index: usize, records: std::ops::Range<usize>) -> UploadOutcome {
        UploadOutcome::Failure(BatchFailure::new(
            batch_index,
            records,
            BatchError::Transport(TransportError::Http {
                status: 500,
                message: "boom".to_string(),
            }),
        ))
    }

    fn success(batch_index: usize, record_count: usize) -> UploadOutcome {
        UploadOutcome::Success {
            batch_index,
            record_count,
            compressed_len: 100,
        }
    }

    #[test]
    fn test_all_successes_complete_without_error() {
        let aggregator = Aggregator::new(None, 2);
        aggregator.report(success(0, 10));
        aggregator.report(success(1, 5));

        assert!(aggregator.finish().is_ok());
        let summary = aggregator.summary();
        assert_eq!(summary.succeeded_batches, 2);
        assert_eq!(summary.succeeded_records, 15);
        assert_eq!(summary.skipped_batches(), 0);
    }

    #[test]
    fn test_failures_without_handler_become_aggregate() {
        let aggregator = Aggregator::new(None, 4);
        aggregator.report(success(0, 10));
        aggregator.report(failure(1, 10..20));
        aggregator.report(success(2, 10));
        aggregator.report(failure(3, 30..33));

        assert!(!aggregator.is_aborted());
        let error = aggregator.finish().unwrap_err();
        let aggregate = error.as_aggregate().expect("aggregate error");
        assert_eq!(aggregate.failed_record_count(), 13);
        let indices: Vec<_> = aggregate.failures().iter().map(|f| f.batch_index()).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn test_non_raising_handler_takes_over_reporting() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handler: ErrorHandler = Box::new(move |failure: BatchFailure| {
            counter.fetch_add(failure.record_count(), Ordering::SeqCst);
            Ok(())
        });

        let aggregator = Aggregator::new(Some(handler), 3);
        aggregator.report(failure(0, 0..4));
        aggregator.report(success(1, 4));
        aggregator.report(failure(2, 8..10));

        assert!(aggregator.finish().is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 6);
        assert_eq!(aggregator.summary().failed_records, 6);
    }

    #[test]
    fn test_raising_handler_aborts_and_discards_later_outcomes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler: ErrorHandler = Box::new(move |failure: BatchFailure| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(format!("giving up at batch {}", failure.batch_index()).into())
        });

        let aggregator = Aggregator::new(Some(handler), 5);
        aggregator.report(success(0, 1));
        aggregator.report(failure(1, 1..2));
        assert!(aggregator.is_aborted());
        assert!(aggregator.abort_signal().is_cancelled());

        aggregator.report(failure(2, 2..3));
        aggregator.report(success(3, 1));

        let error = aggregator.finish().unwrap_err();
        assert_eq!(error.to_string(), "giving up at batch 1");
        assert!(error.as_aggregate().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let summary = aggregator.summary();
        assert_eq!(summary.discarded_outcomes, 2);
        assert_eq!(summary.skipped_batches(), 1);
    }

    #[test]
    fn test_panicking_handler_fires_abort_signal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler: ErrorHandler = Box::new(move |failure: BatchFailure| -> Result<(), HandlerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("handler blew up on batch {}", failure.batch_index());
        });

        let aggregator = Aggregator::new(Some(handler), 4);
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            aggregator.report(failure(0, 0..1));
        }));

        assert!(unwound.is_err());
        assert!(aggregator.is_aborted());

        aggregator.report(failure(1, 1..2));
        aggregator.report(success(2, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.summary().discarded_outcomes, 2);
    }

    #[test]
    fn test_outcomes_after_completion_are_discarded() {
        let aggregator = Aggregator::new(None, 1);
        assert!(aggregator.finish().is_ok());

        aggregator.report(failure(0, 0..1));
        assert!(aggregator.finish().is_ok());
        assert_eq!(aggregator.summary().discarded_outcomes, 1);
    }
}
