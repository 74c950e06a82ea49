//! Per-kind drop counters shared by the pipeline stages.

use std::sync::atomic::{AtomicU64, Ordering};

/// Why a frame (or the envelope that would have become one) was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropKind {
    PoolExhausted,
    EnvelopeMalformed,
    ImageDecodeFailed,
    InferenceFailed,
    ResultOverflow,
    TransportError,
}

impl DropKind {
    pub const ALL: [DropKind; 6] = [
        DropKind::PoolExhausted,
        DropKind::EnvelopeMalformed,
        DropKind::ImageDecodeFailed,
        DropKind::InferenceFailed,
        DropKind::ResultOverflow,
        DropKind::TransportError,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DropKind::PoolExhausted => "pool_exhausted",
            DropKind::EnvelopeMalformed => "envelope_malformed",
            DropKind::ImageDecodeFailed => "image_decode_failed",
            DropKind::InferenceFailed => "inference_failed",
            DropKind::ResultOverflow => "result_overflow",
            DropKind::TransportError => "transport_error",
        }
    }
}

/// One atomic counter per drop kind. Stages record, observers read; drops
/// are also emitted on the `metrics` facade labelled by kind.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pool_exhausted: AtomicU64,
    envelope_malformed: AtomicU64,
    image_decode_failed: AtomicU64,
    inference_failed: AtomicU64,
    result_overflow: AtomicU64,
    transport_error: AtomicU64,
}

impl PipelineCounters {
    pub fn record(&self, kind: DropKind) {
        self.cell(kind).fetch_add(1, Ordering::Relaxed);
        metrics::counter!("worker_frames_dropped_total", "kind" => kind.label()).increment(1);
    }

    pub fn get(&self, kind: DropKind) -> u64 {
        self.cell(kind).load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        DropKind::ALL.iter().map(|kind| self.get(*kind)).sum()
    }

    /// Current value of every counter, labelled.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        DropKind::ALL
            .iter()
            .map(|kind| (kind.label(), self.get(*kind)))
            .collect()
    }

    fn cell(&self, kind: DropKind) -> &AtomicU64 {
        match kind {
            DropKind::PoolExhausted => &self.pool_exhausted,
            DropKind::EnvelopeMalformed => &self.envelope_malformed,
            DropKind::ImageDecodeFailed => &self.image_decode_failed,
            DropKind::InferenceFailed => &self.inference_failed,
            DropKind::ResultOverflow => &self.result_overflow,
            DropKind::TransportError => &self.transport_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_record_independently() {
        let counters = PipelineCounters::default();
        counters.record(DropKind::PoolExhausted);
        counters.record(DropKind::PoolExhausted);
        counters.record(DropKind::TransportError);

        assert_eq!(counters.get(DropKind::PoolExhausted), 2);
        assert_eq!(counters.get(DropKind::TransportError), 1);
        assert_eq!(counters.get(DropKind::InferenceFailed), 0);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn snapshot_covers_every_kind() {
        let counters = PipelineCounters::default();
        counters.record(DropKind::EnvelopeMalformed);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.len(), DropKind::ALL.len());
        assert!(snapshot.contains(&("envelope_malformed", 1)));
        assert!(snapshot.contains(&("pool_exhausted", 0)));
    }
}
