//! Record serialization and payload compression.
//!
//! Both collaborators are narrow traits so the planner never depends on a
//! concrete wire format.

pub mod compression;
pub mod serialization;

pub use compression::{Compressor, GzipCompressor};
pub use serialization::{JsonSerializer, RecordError, RecordSerializer};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Record {index} could not be serialized: {source}")]
    Record {
        index: usize,
        #[source]
        source: RecordError,
    },
    #[error("IO error during compression: {0}")]
    Io(#[from] std::io::Error),
}
