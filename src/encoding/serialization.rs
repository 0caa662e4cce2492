use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}

/// Turns one record into its wire bytes.
///
/// Implementations append to `out` and must be deterministic: the planner
/// relies on the same record always producing the same bytes. On error the
/// planner discards whatever was appended.
pub trait RecordSerializer<R: ?Sized>: Send + Sync {
    fn write_record(&self, record: &R, out: &mut Vec<u8>) -> Result<(), RecordError>;
}

/// Serializes any `serde` record as a single compact JSON value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl<R: Serialize + ?Sized> RecordSerializer<R> for JsonSerializer {
    fn write_record(&self, record: &R, out: &mut Vec<u8>) -> Result<(), RecordError> {
        serde_json::to_writer(out, record)?;
        Ok(())
    }
}
