#![allow(dead_code)]

use rask_log_uploader::batching::Batch;
use rask_log_uploader::transport::{BlockingTransport, Transport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Which batches a fake transport rejects.
#[derive(Debug, Clone, Copy)]
pub enum FailurePattern {
    Never,
    OddBatches,
    Always,
}

impl FailurePattern {
    fn fails(self, batch_index: usize) -> bool {
        match self {
            FailurePattern::Never => false,
            FailurePattern::OddBatches => batch_index % 2 == 1,
            FailurePattern::Always => true,
        }
    }
}

/// One observed transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub batch_index: usize,
    pub first_record: usize,
    pub record_count: usize,
    pub compressed_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Sent(usize),
    Raised(usize),
}

/// Ordered log of transport calls and error-handler decisions.
#[derive(Debug, Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<Event>>>);

impl Timeline {
    pub fn raised(&self, batch_index: usize) {
        self.0.lock().push(Event::Raised(batch_index));
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn raise_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Raised(_)))
            .count()
    }

    /// Transport calls that started after the first raise.
    pub fn sends_after_first_raise(&self) -> usize {
        let events = self.events();
        let Some(first) = events.iter().position(|event| matches!(event, Event::Raised(_))) else {
            return 0;
        };
        events[first..]
            .iter()
            .filter(|event| matches!(event, Event::Sent(_)))
            .count()
    }

    fn sent(&self, batch_index: usize) {
        self.0.lock().push(Event::Sent(batch_index));
    }
}

/// Records every call and the highest number of calls in flight at once.
///
/// Implements both transport traits so the same fixture drives the async
/// and the blocking uploader.
#[derive(Debug)]
pub struct RecordingTransport {
    pattern: FailurePattern,
    latency: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    timeline: Timeline,
}

impl RecordingTransport {
    pub fn new(pattern: FailurePattern) -> Self {
        Self::with_latency(pattern, Duration::ZERO)
    }

    pub fn with_latency(pattern: FailurePattern, latency: Duration) -> Self {
        Self {
            pattern,
            latency,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            timeline: Timeline::default(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        let mut calls = self.calls.lock().clone();
        calls.sort_by_key(|call| call.batch_index);
        calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Shared handle onto this transport's event log.
    pub fn timeline(&self) -> Timeline {
        self.timeline.clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self, batch: &Batch) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.timeline.sent(batch.index());
        self.calls.lock().push(Call {
            batch_index: batch.index(),
            first_record: batch.records().start,
            record_count: batch.record_count(),
            compressed_len: batch.compressed_len(),
        });
    }

    fn leave(&self, batch: &Batch) -> Result<(), TransportError> {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.pattern.fails(batch.index()) {
            Err(TransportError::Http {
                status: 500,
                message: format!("batch {} rejected", batch.index()),
            })
        } else {
            Ok(())
        }
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        self.enter(batch);
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
        self.leave(batch)
    }
}

impl BlockingTransport for RecordingTransport {
    fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        self.enter(batch);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.leave(batch)
    }
}

/// Small, distinct JSON-friendly records.
pub fn small_records(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("log line {i:08}")).collect()
}
