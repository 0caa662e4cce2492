use super::batch::{Batch, OversizedRecord, PlannedBatch};
use crate::encoding::{Compressor, EncodingError, GzipCompressor, JsonSerializer, RecordSerializer};
use bytes::Bytes;
use tracing::{debug, trace};

/// Default ceiling on the compressed size of one request payload (1 MiB).
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Greedy, order-preserving batch planner.
///
/// Records are framed as a JSON array and packed left to right. A record is
/// accepted into the current batch while the compressor's worst-case bound
/// for the framed payload stays within `max_request_bytes`; otherwise the
/// batch is closed and compressed once. A record that does not fit alone by
/// the bound is compressed on its own and either becomes a single-record
/// batch or is reported as oversized.
#[derive(Debug, Clone)]
pub struct BatchPlanner<S = JsonSerializer, C = GzipCompressor> {
    serializer: S,
    compressor: C,
    max_request_bytes: usize,
}

impl BatchPlanner {
    pub fn new(max_request_bytes: usize) -> Self {
        Self::with_codec(JsonSerializer, GzipCompressor::default(), max_request_bytes)
    }
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUEST_BYTES)
    }
}

impl<S, C: Compressor> BatchPlanner<S, C> {
    pub fn with_codec(serializer: S, compressor: C, max_request_bytes: usize) -> Self {
        Self {
            serializer,
            compressor,
            max_request_bytes,
        }
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    pub fn compressor(&self) -> &C {
        &self.compressor
    }

    pub fn plan<R>(&self, records: &[R]) -> Result<Vec<PlannedBatch>, EncodingError>
    where
        S: RecordSerializer<R>,
    {
        let mut builder = PlanBuilder::new(&self.compressor, self.max_request_bytes);

        for (index, record) in records.iter().enumerate() {
            let mark = builder.buf.len();
            if builder.count > 0 {
                builder.buf.push(b',');
            }
            let record_start = builder.buf.len();
            if let Err(source) = self.serializer.write_record(record, &mut builder.buf) {
                return Err(EncodingError::Record { index, source });
            }
            builder.accept(index, mark, record_start)?;
        }

        let plan = builder.finish()?;
        debug!(
            records = records.len(),
            batches = plan.len(),
            max_request_bytes = self.max_request_bytes,
            "planned upload batches"
        );
        Ok(plan)
    }
}

struct PlanBuilder<'a, C> {
    compressor: &'a C,
    ceiling: usize,
    plan: Vec<PlannedBatch>,
    // "[" followed by the accepted records, without the closing bracket
    buf: Vec<u8>,
    first: usize,
    count: usize,
}

impl<'a, C: Compressor> PlanBuilder<'a, C> {
    fn new(compressor: &'a C, ceiling: usize) -> Self {
        Self {
            compressor,
            ceiling,
            plan: Vec::new(),
            buf: vec![b'['],
            first: 0,
            count: 0,
        }
    }

    fn fits(&self, payload_len: usize) -> bool {
        self.compressor.compressed_len_bound(payload_len) <= self.ceiling
    }

    /// Decides where the record just written at `record_start` goes.
    /// `mark` is the buffer length before its separator was written.
    fn accept(&mut self, index: usize, mark: usize, record_start: usize) -> Result<(), EncodingError> {
        // +1 for the closing bracket
        if self.fits(self.buf.len() + 1) {
            if self.count == 0 {
                self.first = index;
            }
            self.count += 1;
            return Ok(());
        }

        if self.count > 0 {
            let record = self.buf.split_off(record_start);
            self.buf.truncate(mark);
            self.close()?;
            self.buf.extend_from_slice(&record);

            if self.fits(self.buf.len() + 1) {
                self.first = index;
                self.count = 1;
                return Ok(());
            }
        }

        self.place_alone(index)
    }

    /// Measures a lone record exactly; the bound was too pessimistic for it.
    fn place_alone(&mut self, index: usize) -> Result<(), EncodingError> {
        self.buf.push(b']');
        let compressed = self.compressor.compress(&self.buf)?;
        let batch_index = self.plan.len();

        if compressed.len() <= self.ceiling {
            trace!(batch_index, record = index, "record placed in its own batch");
            self.plan.push(PlannedBatch::Upload(Batch::new(
                batch_index,
                index..index + 1,
                Bytes::from(compressed),
                self.buf.len(),
                self.compressor.content_encoding(),
            )));
        } else {
            debug!(
                batch_index,
                record = index,
                compressed_len = compressed.len(),
                ceiling = self.ceiling,
                "record exceeds request ceiling on its own"
            );
            self.plan.push(PlannedBatch::Oversized(OversizedRecord {
                index: batch_index,
                record: index,
                compressed_len: compressed.len(),
                ceiling: self.ceiling,
            }));
        }

        self.reset();
        Ok(())
    }

    fn close(&mut self) -> Result<(), EncodingError> {
        if self.count == 0 {
            return Ok(());
        }

        self.buf.push(b']');
        let compressed = self.compressor.compress(&self.buf)?;
        debug_assert!(compressed.len() <= self.ceiling);

        let batch_index = self.plan.len();
        trace!(
            batch_index,
            records = self.count,
            uncompressed_len = self.buf.len(),
            compressed_len = compressed.len(),
            "closed batch"
        );
        self.plan.push(PlannedBatch::Upload(Batch::new(
            batch_index,
            self.first..self.first + self.count,
            Bytes::from(compressed),
            self.buf.len(),
            self.compressor.content_encoding(),
        )));

        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.buf.push(b'[');
        self.count = 0;
    }

    fn finish(mut self) -> Result<Vec<PlannedBatch>, EncodingError> {
        self.close()?;
        Ok(self.plan)
    }
}
