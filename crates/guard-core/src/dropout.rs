//! Outbound throughput tracking and dropout detection
//!
//! [`ThroughputTracker`] turns cumulative byte/packet counters into per-window
//! bitrates. A window in which neither counter advanced is a dropout: the
//! sender was registered and live but nothing left the wire.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

/// Number of dropout windows kept in a [`DropoutSummary`]
pub const MAX_DROPOUT_WINDOWS: usize = 20;

/// Throughput of one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    /// Kilobits per second, rounded to two decimals
    pub kbps: f64,
    /// Neither bytes nor packets advanced since the previous window
    pub dropped: bool,
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    at: Duration,
    bytes: u64,
    packets: u64,
}

/// Per-stream cumulative counter history
///
/// Streams are keyed by caller-chosen strings, typically `"<pc>:<track>"`.
/// Times are offsets from a common origin so the tracker stays independent
/// of any clock source.
#[derive(Debug, Default)]
pub struct ThroughputTracker {
    previous: HashMap<String, Counter>,
}

impl ThroughputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record cumulative counters for `key` observed at `at`
    ///
    /// The first observation of a key yields `0` kbps and is never a dropout.
    pub fn observe(&mut self, key: &str, at: Duration, bytes: u64, packets: u64) -> Throughput {
        let current = Counter { at, bytes, packets };
        let Some(prev) = self.previous.insert(key.to_string(), current) else {
            return Throughput {
                kbps: 0.0,
                dropped: false,
            };
        };

        let dt = at.saturating_sub(prev.at).as_secs_f64();
        let delta_bytes = bytes as i128 - prev.bytes as i128;
        let delta_packets = packets as i128 - prev.packets as i128;

        let kbps = if dt > 0.0 {
            (delta_bytes as f64 * 8.0) / 1000.0 / dt
        } else {
            0.0
        };

        Throughput {
            kbps: round2(kbps),
            dropped: delta_bytes <= 0 && delta_packets <= 0,
        }
    }

    /// Number of distinct streams seen
    pub fn streams(&self) -> usize {
        self.previous.len()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One throughput sample of one sender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputSample {
    /// Milliseconds since the probe started
    pub elapsed_ms: u64,
    pub pc_id: u64,
    pub track_id: Option<String>,
    pub track_label: Option<String>,
    pub kbps: f64,
    /// Cumulative bytes sent
    pub bytes: u64,
    /// Cumulative packets sent
    pub packets: u64,
    pub dropped: bool,
}

/// Result of a dropout probe
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DropoutSummary {
    pub samples: usize,
    pub dropouts: usize,
    /// The first dropout samples, at most [`MAX_DROPOUT_WINDOWS`]
    pub dropout_windows: Vec<ThroughputSample>,
}

impl DropoutSummary {
    pub fn from_samples(samples: &[ThroughputSample]) -> Self {
        let dropped: Vec<&ThroughputSample> = samples.iter().filter(|s| s.dropped).collect();
        Self {
            samples: samples.len(),
            dropouts: dropped.len(),
            dropout_windows: dropped.into_iter().take(MAX_DROPOUT_WINDOWS).cloned().collect(),
        }
    }

    /// At least one sample and no dropouts
    pub fn passed(&self) -> bool {
        self.samples > 0 && self.dropouts == 0
    }
}
