use super::{Transport, TransportError};
use crate::batching::Batch;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub max_connections: usize,
    pub keep_alive_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://rask-log-aggregator:9600/v1/aggregate".to_string(),
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            max_connections: 20,
            keep_alive_timeout: Duration::from_secs(60),
            user_agent: format!("rask-log-uploader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpTransportConfig {
    pub(crate) fn parse_endpoint(&self) -> Result<Url, TransportError> {
        self.endpoint.parse().map_err(|e| {
            TransportError::InvalidConfiguration(format!(
                "Invalid endpoint URL '{}': {}",
                self.endpoint, e
            ))
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub bytes_sent: u64,
    pub average_response_time: Duration,
}

#[derive(Debug, Default)]
pub(crate) struct RequestCounters {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    bytes_sent: AtomicU64,
    total_response_time: AtomicU64,
}

impl RequestCounters {
    pub(crate) fn record(&self, success: bool, bytes: usize, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.total_response_time
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> TransportStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.total_response_time.load(Ordering::Relaxed);

        let average_response_time = if total_requests > 0 {
            Duration::from_millis(total_response_time / total_requests)
        } else {
            Duration::ZERO
        };

        TransportStats {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            average_response_time,
        }
    }
}

pub(crate) fn batch_headers(batch: &Batch) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(encoding) = batch.content_encoding() {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
    }
    headers.insert(
        HeaderName::from_static("x-batch-index"),
        HeaderValue::from(batch.index()),
    );
    headers.insert(
        HeaderName::from_static("x-batch-records"),
        HeaderValue::from(batch.record_count()),
    );

    headers
}

pub(crate) fn request_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> TransportError {
    let body = body.trim();
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY_CHARS).collect()
    };

    TransportError::Http {
        status: status.as_u16(),
        message,
    }
}

/// Async HTTP transport that POSTs each batch payload to one URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
    url: Url,
    counters: Arc<RequestCounters>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let url = config.parse_endpoint()?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .pool_idle_timeout(config.keep_alive_timeout)
            .user_agent(&config.user_agent)
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

impl Transport for HttpTransport {
    async fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.url.clone())
            .headers(batch_headers(batch))
            .body(batch.payload().clone())
            .send()
            .await;

        let response = match response {
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

        let body = response.text().await.unwrap_or_default();
        warn!(
            batch_index = batch.index(),
            status = status.as_u16(),
            "collector rejected batch"
        );
        Err(status_error(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sample_batch() -> Batch {
        Batch::new(4, 10..25, Bytes::from_static(b"payload"), 40, Some("gzip"))
    }

    #[test]
    fn test_batch_headers() {
        let headers = batch_headers(&sample_batch());

        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[CONTENT_ENCODING], "gzip");
        assert_eq!(headers["x-batch-index"], "4");
        assert_eq!(headers["x-batch-records"], "15");
    }

    #[test]
    fn test_status_error_prefers_body_then_reason() {
        assert_eq!(
            status_error(StatusCode::PAYLOAD_TOO_LARGE, "  payload over limit \n"),
            TransportError::Http {
                status: 413,
                message: "payload over limit".to_string(),
            }
        );
        assert_eq!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, ""),
            TransportError::Http {
                status: 503,
                message: "Service Unavailable".to_string(),
            }
        );

        let long_body = "e".repeat(2000);
        match status_error(StatusCode::BAD_REQUEST, &long_body) {
            TransportError::Http { message, .. } => {
                assert_eq!(message.len(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let config = HttpTransportConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };

        match HttpTransport::new(config) {
            Err(TransportError::InvalidConfiguration(message)) => {
                assert!(message.contains("not a url"));
            }
            other => panic!("expected invalid configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_counters_average_response_time() {
        let counters = RequestCounters::default();
        counters.record(true, 100, Duration::from_millis(10));
        counters.record(false, 50, Duration::from_millis(30));

        let stats = counters.snapshot();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.successful_requests, 1);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.bytes_sent, 150);
        assert_eq!(stats.average_response_time, Duration::from_millis(20));
    }
}
