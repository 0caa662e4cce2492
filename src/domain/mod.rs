//! Domain layer for rask-log-uploader.
//!
//! Contains the types shared by the planner, the dispatcher and callers:
//! - `BatchFailure`: what a caller learns about one failed batch
//! - `UploadOptions`: per-call concurrency and failure policy
//! - `UploadError`: terminal result of an upload call

pub mod error;
pub mod failure;
pub mod options;

pub use error::{AggregateUploadError, UploadError};
pub use failure::{BatchError, BatchFailure};
pub use options::{ErrorHandler, HandlerError, UploadOptions};
