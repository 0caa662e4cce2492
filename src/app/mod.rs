pub mod config;
pub mod input;
pub mod logging;

pub use config::{Config, ConfigError, ErrorPolicy, LogFormat, LogLevel};
pub use input::{InputError, read_records, read_records_from};
pub use logging::{LoggingError, init_logging};

use crate::domain::UploadError;
use crate::transport::{BlockingHttpTransport, HttpTransport, TransportStats};
#[cfg(feature = "metrics")]
use crate::upload::UploadMetrics;
use crate::upload::{BlockingLogsUploader, LogsUploader};
use anyhow::Context;
use serde_json::Value;
use tracing::{error, info};

/// The `rask-log-uploader` command: read NDJSON records, upload them once.
pub struct App {
    config: Config,
    #[cfg(feature = "metrics")]
    metrics: UploadMetrics,
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            #[cfg(feature = "metrics")]
            metrics: UploadMetrics::new().context("failed to register upload metrics")?,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting rask-log-uploader v{}", crate::VERSION);
        info!(
            "Configuration: endpoint={}, max_request_bytes={}, max_concurrency={}, error_policy={:?}, blocking={}",
            self.config.endpoint,
            self.config.max_request_bytes,
            self.config.max_concurrency,
            self.config.error_policy,
            self.config.blocking
        );

        let path = self.config.input.clone();
        let records = tokio::task::spawn_blocking(move || read_records_from(&path))
            .await
            .context("input reader panicked")?
            .with_context(|| format!("failed to read {}", self.config.input.display()))?;
        info!(records = records.len(), "loaded input records");

        let (result, stats) = if self.config.blocking {
            self.upload_blocking(records).await?
        } else {
            self.upload_async(&records).await?
        };

        info!(
            requests = stats.total_requests,
            successful = stats.successful_requests,
            failed = stats.failed_requests,
            bytes_sent = stats.bytes_sent,
            average_response_ms = stats.average_response_time.as_millis() as u64,
            "transport statistics"
        );

        #[cfg(feature = "metrics")]
        match self.metrics.export() {
            Ok(exposition) => tracing::debug!(%exposition, "upload metrics"),
            Err(e) => tracing::debug!(error = %e, "failed to export upload metrics"),
        }

        report(result)
    }

    async fn upload_async(
        &self,
        records: &[Value],
    ) -> anyhow::Result<(Result<(), UploadError>, TransportStats)> {
        let transport = HttpTransport::new(self.config.transport_config())?;
        let uploader = LogsUploader::new(transport, self.config.uploader_config());
        #[cfg(feature = "metrics")]
        let uploader = uploader.with_metrics(self.metrics.clone());

        let result = uploader
            .upload(records, self.config.upload_options())
            .await;
        Ok((result, uploader.transport().stats()))
    }

    async fn upload_blocking(
        &self,
        records: Vec<Value>,
    ) -> anyhow::Result<(Result<(), UploadError>, TransportStats)> {
        let config = self.config.clone();
        #[cfg(feature = "metrics")]
        let metrics = self.metrics.clone();

        let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let transport = BlockingHttpTransport::new(config.transport_config())?;
            let uploader = BlockingLogsUploader::new(transport, config.uploader_config());
            #[cfg(feature = "metrics")]
            let uploader = uploader.with_metrics(metrics);

            let result = uploader.upload(&records, config.upload_options());
            Ok((result, uploader.transport().stats()))
        })
        .await
        .context("blocking uploader panicked")??;

        Ok(outcome)
    }
}

fn report(result: Result<(), UploadError>) -> anyhow::Result<()> {
    match result {
        Ok(()) => {
            info!("all records uploaded");
            Ok(())
        }
        Err(UploadError::Aggregate(aggregate)) => {
            for failure in aggregate.failures() {
                error!(
                    batch_index = failure.batch_index(),
                    first_record = failure.records().start,
                    records = failure.record_count(),
                    status = failure.error().status(),
                    error = %failure.error(),
                    "batch was not uploaded"
                );
            }
            Err(UploadError::Aggregate(aggregate)).context("upload finished with failures")
        }
        Err(e) => Err(e).context("upload failed"),
    }
}
