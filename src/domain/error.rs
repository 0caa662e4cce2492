use super::{BatchFailure, HandlerError};
use crate::encoding::EncodingError;
use thiserror::Error;

/// Raised when no error handler was installed and at least one batch failed.
/// Only constructed after every batch has been attempted.
#[derive(Error, Debug)]
#[error(
    "{failed_record_count} records failed to upload across {} batches",
    .failures.len()
)]
pub struct AggregateUploadError {
    failed_record_count: usize,
    failures: Vec<BatchFailure>,
}

impl AggregateUploadError {
    pub(crate) fn new(failures: Vec<BatchFailure>) -> Self {
        let failed_record_count = failures.iter().map(BatchFailure::record_count).sum();
        Self {
            failed_record_count,
            failures,
        }
    }

    pub fn failed_record_count(&self) -> usize {
        self.failed_record_count
    }

    /// One entry per failed batch, in the order the failures were observed.
    pub fn failures(&self) -> &[BatchFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<BatchFailure> {
        self.failures
    }
}

/// Terminal result of an upload call.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Aggregate(#[from] AggregateUploadError),

    /// The error raised by the caller's error handler, unmodified.
    #[error(transparent)]
    Aborted(HandlerError),

    #[error("Failed to encode upload payload: {0}")]
    Encoding(#[from] EncodingError),
}

impl UploadError {
    pub fn as_aggregate(&self) -> Option<&AggregateUploadError> {
        match self {
            UploadError::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }

    pub fn handler_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            UploadError::Aborted(error) => Some(error.as_ref()),
            _ => None,
        }
    }

    pub fn into_handler_error(self) -> Result<HandlerError, Self> {
        match self {
            UploadError::Aborted(error) => Ok(error),
            other => Err(other),
        }
    }
}
