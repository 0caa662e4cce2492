use super::aggregator::Aggregator;
use super::dispatcher::{DispatchCore, dispatch_async, dispatch_blocking};
#[cfg(feature = "metrics")]
use super::metrics::UploadMetrics;
use crate::batching::{BatchPlanner, DEFAULT_MAX_REQUEST_BYTES, PlannedBatch};
use crate::domain::{ErrorHandler, UploadError, UploadOptions};
use crate::encoding::{Compressor, GzipCompressor, JsonSerializer, RecordSerializer};
use crate::transport::{BlockingTransport, Transport};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Ceiling on the compressed size of one request payload.
    pub max_request_bytes: usize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Uploads record collections through an async [`Transport`].
///
/// Each call to [`LogsUploader::upload`] is independent: it plans the
/// records into size-bounded batches, sends up to `max_concurrency` of
/// them at a time and resolves once every dispatched batch has settled.
pub struct LogsUploader<T, S = JsonSerializer, C = GzipCompressor> {
    transport: Arc<T>,
    planner: BatchPlanner<S, C>,
    #[cfg(feature = "metrics")]
    metrics: Option<UploadMetrics>,
}

impl<T: Transport + 'static> LogsUploader<T> {
    pub fn new(transport: T, config: UploaderConfig) -> Self {
        Self::with_planner(transport, BatchPlanner::new(config.max_request_bytes))
    }
}

impl<T, S, C> LogsUploader<T, S, C>
where
    T: Transport + 'static,
    C: Compressor,
{
    pub fn with_planner(transport: T, planner: BatchPlanner<S, C>) -> Self {
        Self {
            transport: Arc::new(transport),
            planner,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: UploadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn planner(&self) -> &BatchPlanner<S, C> {
        &self.planner
    }

    /// Uploads `records`, returning once every dispatched batch has settled.
    ///
    /// Without an error handler, failed batches are collected into
    /// [`UploadError::Aggregate`]. With one, the handler sees each failure
    /// as it happens; if it returns an error the upload stops dispatching
    /// and that error is returned as [`UploadError::Aborted`].
    pub async fn upload<R>(&self, records: &[R], options: UploadOptions) -> Result<(), UploadError>
    where
        S: RecordSerializer<R>,
    {
        let span = info_span!("upload", upload_id = %Uuid::new_v4(), records = records.len());

        async move {
            let (max_concurrency, handler) = options.into_parts();
            let Some(plan) = plan_upload(&self.planner, records)? else {
                return Ok(());
            };

            let core = Arc::new(self.dispatch_core(handler, &plan));
            info!(
                batches = plan.len(),
                max_concurrency = max_concurrency.get(),
                "starting upload"
            );

            dispatch_async(
                Arc::clone(&self.transport),
                plan,
                Arc::clone(&core),
                max_concurrency,
            )
            .await;

            core.finish()
        }
        .instrument(span)
        .await
    }

    fn dispatch_core(&self, handler: Option<ErrorHandler>, plan: &[PlannedBatch]) -> DispatchCore {
        let aggregator = Aggregator::new(handler, plan.len());
        #[cfg(feature = "metrics")]
        let aggregator = aggregator.with_metrics(self.metrics.clone());
        DispatchCore::new(aggregator)
    }
}

/// Thread-blocking twin of [`LogsUploader`] with identical semantics.
///
/// Concurrency comes from scoped worker threads, so it must not be called
/// from inside an async runtime.
pub struct BlockingLogsUploader<T, S = JsonSerializer, C = GzipCompressor> {
    transport: T,
    planner: BatchPlanner<S, C>,
    #[cfg(feature = "metrics")]
    metrics: Option<UploadMetrics>,
}

impl<T: BlockingTransport> BlockingLogsUploader<T> {
    pub fn new(transport: T, config: UploaderConfig) -> Self {
        Self::with_planner(transport, BatchPlanner::new(config.max_request_bytes))
    }
}

impl<T, S, C> BlockingLogsUploader<T, S, C>
where
    T: BlockingTransport,
    C: Compressor,
{
    pub fn with_planner(transport: T, planner: BatchPlanner<S, C>) -> Self {
        Self {
            transport,
            planner,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: UploadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn planner(&self) -> &BatchPlanner<S, C> {
        &self.planner
    }

    pub fn upload<R>(&self, records: &[R], options: UploadOptions) -> Result<(), UploadError>
    where
        S: RecordSerializer<R>,
    {
        let span = info_span!("upload", upload_id = %Uuid::new_v4(), records = records.len());
        let _entered = span.enter();

        let (max_concurrency, handler) = options.into_parts();
        let Some(plan) = plan_upload(&self.planner, records)? else {
            return Ok(());
        };

        let core = self.dispatch_core(handler, &plan);
        info!(
            batches = plan.len(),
            max_concurrency = max_concurrency.get(),
            "starting upload"
        );

        dispatch_blocking(&self.transport, plan, &core, max_concurrency);

        core.finish()
    }

    fn dispatch_core(&self, handler: Option<ErrorHandler>, plan: &[PlannedBatch]) -> DispatchCore {
        let aggregator = Aggregator::new(handler, plan.len());
        #[cfg(feature = "metrics")]
        let aggregator = aggregator.with_metrics(self.metrics.clone());
        DispatchCore::new(aggregator)
    }
}

/// `None` when there is nothing to send.
fn plan_upload<R, S, C>(
    planner: &BatchPlanner<S, C>,
    records: &[R],
) -> Result<Option<Vec<PlannedBatch>>, UploadError>
where
    S: RecordSerializer<R>,
    C: Compressor,
{
    if records.is_empty() {
        debug!("no records to upload");
        return Ok(None);
    }

    Ok(Some(planner.plan(records)?))
}
