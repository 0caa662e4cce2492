use crate::transport::TransportError;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Why a single batch could not be delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Record compresses to {size} bytes, above the {ceiling} byte request ceiling")]
    OversizedRecord { size: usize, ceiling: usize },
}

impl BatchError {
    /// HTTP status of the failed request, if the collector answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            BatchError::Transport(TransportError::Http { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// The failing batch as seen by callers and error handlers.
///
/// `records` is the half-open range of indices into the slice that was
/// passed to `upload`, so callers can re-submit exactly the failed records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    batch_index: usize,
    records: Range<usize>,
    error: BatchError,
}

impl BatchFailure {
    pub fn new(batch_index: usize, records: Range<usize>, error: BatchError) -> Self {
        Self {
            batch_index,
            records,
            error,
        }
    }

    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn records(&self) -> Range<usize> {
        self.records.clone()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn error(&self) -> &BatchError {
        &self.error
    }

    pub fn into_error(self) -> BatchError {
        self.error
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} (records {}..{}, {} records): {}",
            self.batch_index,
            self.records.start,
            self.records.end,
            self.record_count(),
            self.error
        )
    }
}

impl std::error::Error for BatchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
