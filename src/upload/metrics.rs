use super::aggregator::UploadOutcome;
use crate::domain::BatchError;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus counters for batch outcomes.
///
/// Cheap to clone; one instance is usually shared by every uploader in a
/// process and exported through [`UploadMetrics::export`].
#[derive(Clone)]
pub struct UploadMetrics {
    registry: Arc<Registry>,
    batches: IntCounterVec,
    records: IntCounterVec,
    batch_bytes: Histogram,
}

impl UploadMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    pub fn with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let batches = IntCounterVec::new(
            Opts::new("rask_upload_batches_total", "Batches by upload outcome"),
            &["outcome"], // success, transport_error, oversized
        )?;
        registry.register(Box::new(batches.clone()))?;

        let records = IntCounterVec::new(
            Opts::new("rask_upload_records_total", "Records by upload outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(records.clone()))?;

        let batch_bytes = Histogram::with_opts(
            HistogramOpts::new(
                "rask_upload_batch_bytes",
                "Compressed size of successfully uploaded batches",
            )
            .buckets(prometheus::exponential_buckets(1024.0, 4.0, 8)?),
        )?;
        registry.register(Box::new(batch_bytes.clone()))?;

        Ok(Self {
            registry,
            batches,
            records,
            batch_bytes,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn observe(&self, outcome: &UploadOutcome) {
        let (label, record_count) = match outcome {
            UploadOutcome::Success {
                record_count,
                compressed_len,
                ..
            } => {
                self.batch_bytes.observe(*compressed_len as f64);
                ("success", *record_count)
            }
            UploadOutcome::Failure(failure) => match failure.error() {
                BatchError::Transport(_) => ("transport_error", failure.record_count()),
                BatchError::OversizedRecord { .. } => ("oversized", failure.record_count()),
            },
        };

        self.batches.with_label_values(&[label]).inc();
        self.records
            .with_label_values(&[label])
            .inc_by(record_count as u64);
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

impl std::fmt::Debug for UploadMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadMetrics").finish_non_exhaustive()
    }
}
