//! Concurrency-bounded execution of an upload plan.
//!
//! Both execution modes share [`DispatchCore`], which owns the aggregator
//! and the in-flight accounting. The async adapter bounds concurrency with a
//! semaphore and a `JoinSet`; the blocking adapter runs a fixed pool of
//! scoped threads that drain a shared queue. For the same plan, transport
//! results and error handler they produce the same outcome.

use super::aggregator::{Aggregator, UploadOutcome};
use crate::batching::{Batch, OversizedRecord, PlannedBatch};
use crate::domain::{BatchError, BatchFailure, UploadError};
use crate::transport::{BlockingTransport, Transport, TransportError};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::{thread, vec};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

#[derive(Debug, Default)]
struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { gauge: self }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Marks one transport call as in flight until dropped.
pub(crate) struct InFlightGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State shared by every worker of one upload call.
pub(crate) struct DispatchCore {
    aggregator: Aggregator,
    in_flight: InFlightGauge,
}

impl DispatchCore {
    pub(crate) fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            in_flight: InFlightGauge::default(),
        }
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aggregator.is_aborted()
    }

    pub(crate) fn abort_signal(&self) -> &CancellationToken {
        self.aggregator.abort_signal()
    }

    /// Reports a record that never reaches the transport.
    pub(crate) fn reject(&self, oversized: OversizedRecord) {
        self.aggregator
            .report(UploadOutcome::Failure(BatchFailure::new(
                oversized.index,
                oversized.records(),
                BatchError::OversizedRecord {
                    size: oversized.compressed_len,
                    ceiling: oversized.ceiling,
                },
            )));
    }

    /// Claims an in-flight slot for `batch`, or `None` once the upload has
    /// been aborted.
    pub(crate) fn begin(&self, batch: &Batch) -> Option<InFlightGuard<'_>> {
        if self.is_aborted() {
            trace!(batch_index = batch.index(), "skipping batch after abort");
            return None;
        }
        Some(self.in_flight.enter())
    }

    pub(crate) fn complete(
        &self,
        batch: &Batch,
        result: Result<(), TransportError>,
        guard: InFlightGuard<'_>,
    ) {
        drop(guard);

        let outcome = match result {
            Ok(()) => UploadOutcome::Success {
                batch_index: batch.index(),
                record_count: batch.record_count(),
                compressed_len: batch.compressed_len(),
            },
            Err(error) => UploadOutcome::Failure(BatchFailure::new(
                batch.index(),
                batch.records(),
                BatchError::Transport(error),
            )),
        };
        self.aggregator.report(outcome);
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }

    pub(crate) fn finish(&self) -> Result<(), UploadError> {
        let summary = self.aggregator.summary();
        info!(
            planned_batches = summary.planned_batches,
            succeeded_batches = summary.succeeded_batches,
            succeeded_records = summary.succeeded_records,
            failed_batches = summary.failed_batches,
            failed_records = summary.failed_records,
            skipped_batches = summary.skipped_batches(),
            discarded_outcomes = summary.discarded_outcomes,
            peak_in_flight = self.peak_in_flight(),
            "upload finished"
        );
        self.aggregator.finish()
    }
}

/// Runs the plan on the current tokio runtime.
///
/// Returns once every spawned transport call has settled, even after an
/// abort. A panic raised by a worker is resumed here after the rest drain.
pub(crate) async fn dispatch_async<T>(
    transport: Arc<T>,
    plan: Vec<PlannedBatch>,
    core: Arc<DispatchCore>,
    max_concurrency: NonZeroUsize,
) where
    T: Transport + 'static,
{
    let permits = Arc::new(Semaphore::new(max_concurrency.get()));
    let mut workers = JoinSet::new();
    let mut panicked = None;

    for planned in plan {
        if core.is_aborted() {
            break;
        }

        let batch = match planned {
            PlannedBatch::Upload(batch) => batch,
            PlannedBatch::Oversized(oversized) => {
                core.reject(oversized);
                continue;
            }
        };

        let permit = tokio::select! {
            biased;
            () = core.abort_signal().cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let transport = Arc::clone(&transport);
        let worker_core = Arc::clone(&core);
        workers.spawn(async move {
            let _permit = permit;
            if let Some(guard) = worker_core.begin(&batch) {
                let result = Transport::send(&*transport, &batch).await;
                worker_core.complete(&batch, result, guard);
            }
        });

        while let Some(joined) = workers.try_join_next() {
            note_join(joined, &mut panicked, &core);
        }
    }

    while let Some(joined) = workers.join_next().await {
        note_join(joined, &mut panicked, &core);
    }

    if let Some(payload) = panicked {
        std::panic::resume_unwind(payload);
    }
}

fn note_join(
    joined: Result<(), JoinError>,
    panicked: &mut Option<Box<dyn std::any::Any + Send>>,
    core: &DispatchCore,
) {
    let Err(error) = joined else {
        return;
    };

    if error.is_panic() {
        warn!("upload worker panicked, stopping dispatch");
        core.abort_signal().cancel();
        if panicked.is_none() {
            *panicked = Some(error.into_panic());
        }
    }
}

/// Runs the plan on the calling thread plus up to `max_concurrency - 1`
/// scoped worker threads. Returns after every worker has exited.
pub(crate) fn dispatch_blocking<T>(
    transport: &T,
    plan: Vec<PlannedBatch>,
    core: &DispatchCore,
    max_concurrency: NonZeroUsize,
) where
    T: BlockingTransport,
{
    let workers = max_concurrency.get().min(plan.len()).max(1);
    let queue = Mutex::new(plan.into_iter());

    thread::scope(|scope| {
        for worker in 1..workers {
            let queue = &queue;
            let spawned = thread::Builder::new()
                .name(format!("rask-upload-{worker}"))
                .spawn_scoped(scope, move || drain_queue(transport, queue, core));

            if let Err(e) = spawned {
                warn!(error = %e, workers = worker, "could not spawn upload worker, continuing with fewer");
                break;
            }
        }

        drain_queue(transport, &queue, core);
    });
}

fn drain_queue<T: BlockingTransport>(
    transport: &T,
    queue: &Mutex<vec::IntoIter<PlannedBatch>>,
    core: &DispatchCore,
) {
    loop {
        if core.is_aborted() {
            break;
        }

        let Some(planned) = queue.lock().next() else {
            break;
        };

        match planned {
            PlannedBatch::Oversized(oversized) => core.reject(oversized),
            PlannedBatch::Upload(batch) => {
                if let Some(guard) = core.begin(&batch) {
                    let result = BlockingTransport::send(transport, &batch);
                    core.complete(&batch, result, guard);
                }
            }
        }
    }
}
