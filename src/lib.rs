#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Safe within realistic value bounds (durations, sizes)
    clippy::cast_precision_loss,      // Acceptable for metrics/display
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. UploadError in upload module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

//! Batched, size-bounded, concurrency-limited log uploads.
//!
//! Records are planned into compressed batches that each stay under a
//! request ceiling, dispatched through a [`transport::Transport`] (or its
//! blocking twin) with at most `max_concurrency` requests in flight, and
//! failures are either aggregated or handed to a caller-supplied handler
//! that may abort the upload.

pub mod app;
pub mod batching;
pub mod domain;
pub mod encoding;
pub mod transport;
pub mod upload;

// Re-export main types for easy access
pub use batching::{Batch, BatchPlanner, DEFAULT_MAX_REQUEST_BYTES};
pub use domain::{
    AggregateUploadError, BatchError, BatchFailure, ErrorHandler, HandlerError, UploadError,
    UploadOptions,
};
pub use encoding::{Compressor, GzipCompressor, JsonSerializer, RecordSerializer};
pub use transport::{BlockingTransport, Transport, TransportError};
pub use upload::{BlockingLogsUploader, LogsUploader, UploaderConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
