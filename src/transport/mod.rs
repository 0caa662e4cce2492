//! Delivery of one compressed batch to the collector.
//!
//! The upload engine only sees the two traits below. It calls `send`
//! exactly once per batch and never retries; timeouts, connection reuse
//! and any retry policy belong to the implementation.

pub mod blocking;
pub mod http;

pub use blocking::BlockingHttpTransport;
pub use http::{HttpTransport, HttpTransportConfig, TransportStats};

use crate::batching::Batch;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },
    #[error("Request timeout: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Sends batches from async code.
pub trait Transport: Send + Sync {
    fn send(&self, batch: &Batch) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Sends batches from a plain thread, blocking until the collector answers.
pub trait BlockingTransport: Send + Sync {
    fn send(&self, batch: &Batch) -> Result<(), TransportError>;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(&self, batch: &Batch) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).send(batch)
    }
}

impl<T: BlockingTransport + ?Sized> BlockingTransport for std::sync::Arc<T> {
    fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        (**self).send(batch)
    }
}
