//! Upload orchestration: planning, bounded dispatch and failure handling.

pub mod aggregator;
pub mod client;
pub(crate) mod dispatcher;
#[cfg(feature = "metrics")]
pub mod metrics;

pub use aggregator::{UploadOutcome, UploadSummary};
pub use client::{BlockingLogsUploader, LogsUploader, UploaderConfig};
#[cfg(feature = "metrics")]
pub use metrics::UploadMetrics;
