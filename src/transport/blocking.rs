use super::http::{RequestCounters, batch_headers, request_error, status_error};
use super::{BlockingTransport, HttpTransportConfig, TransportError, TransportStats};
use crate::batching::Batch;
use reqwest::blocking::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Thread-blocking counterpart of [`super::HttpTransport`].
///
/// Must not be created or dropped inside an async runtime context; use it
/// from plain threads or `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct BlockingHttpTransport {
    client: Client,
    config: HttpTransportConfig,
    url: Url,
    counters: Arc<RequestCounters>,
}

impl BlockingHttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let url = config.parse_endpoint()?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .pool_idle_timeout(config.keep_alive_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                TransportError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            url,
            counters: Arc::new(RequestCounters::default()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn stats(&self) -> TransportStats {
        self.counters.snapshot()
    }
}

impl BlockingTransport for BlockingHttpTransport {
    fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        let start = Instant::now();

        let response = match self
            .client
            .post(self.url.clone())
            .headers(batch_headers(batch))
            .body(batch.payload().clone())
            .send()
        {
            Ok(response) => response,
            Err(e) => {
                self.counters.record(false, 0, start.elapsed());
                return Err(request_error(e));
            }
        };

        let status = response.status();
        let latency = start.elapsed();
        self.counters
            .record(status.is_success(), batch.compressed_len(), latency);

        if status.is_success() {
            debug!(
                batch_index = batch.index(),
                records = batch.record_count(),
                bytes = batch.compressed_len(),
                ?latency,
                "batch accepted"
            );
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        warn!(
            batch_index = batch.index(),
            status = status.as_u16(),
            "collector rejected batch"
        );
        Err(status_error(status, &body))
    }
}
