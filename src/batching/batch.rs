use bytes::Bytes;
use std::ops::Range;

/// One request's worth of records, already framed and compressed.
///
/// Batches are built by the planner for a single upload call and are
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct Batch {
    index: usize,
    records: Range<usize>,
    payload: Bytes,
    uncompressed_len: usize,
    content_encoding: Option<&'static str>,
}

impl Batch {
    pub fn new(
        index: usize,
        records: Range<usize>,
        payload: Bytes,
        uncompressed_len: usize,
        content_encoding: Option<&'static str>,
    ) -> Self {
        Self {
            index,
            records,
            payload,
            uncompressed_len,
            content_encoding,
        }
    }

    /// Position of this batch in the upload plan.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Indices of the covered records in the caller's input.
    pub fn records(&self) -> Range<usize> {
        self.records.clone()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn compressed_len(&self) -> usize {
        self.payload.len()
    }

    pub fn uncompressed_len(&self) -> usize {
        self.uncompressed_len
    }

    pub fn content_encoding(&self) -> Option<&'static str> {
        self.content_encoding
    }
}

/// A record that cannot be sent because it alone exceeds the request ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizedRecord {
    pub index: usize,
    pub record: usize,
    pub compressed_len: usize,
    pub ceiling: usize,
}

impl OversizedRecord {
    pub fn records(&self) -> Range<usize> {
        self.record..self.record + 1
    }
}

/// One step of an upload plan.
#[derive(Debug, Clone)]
pub enum PlannedBatch {
    Upload(Batch),
    Oversized(OversizedRecord),
}

impl PlannedBatch {
    pub fn index(&self) -> usize {
        match self {
            PlannedBatch::Upload(batch) => batch.index(),
            PlannedBatch::Oversized(oversized) => oversized.index,
        }
    }

    pub fn records(&self) -> Range<usize> {
        match self {
            PlannedBatch::Upload(batch) => batch.records(),
            PlannedBatch::Oversized(oversized) => oversized.records(),
        }
    }

    pub fn as_batch(&self) -> Option<&Batch> {
        match self {
            PlannedBatch::Upload(batch) => Some(batch),
            PlannedBatch::Oversized(_) => None,
        }
    }
}
