//! Splits an upload into size-bounded request payloads.

pub mod batch;
pub mod planner;

pub use batch::{Batch, OversizedRecord, PlannedBatch};
pub use planner::{BatchPlanner, DEFAULT_MAX_REQUEST_BYTES};
