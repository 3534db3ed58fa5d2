//! # cleanlink-guard-core
//!
//! Pure evaluation logic for the runtime guard:
//!
//! - [`opus_guard`]: did the last SDP rewrite actually carry the policy?
//! - [`stereo`]: is the outgoing track really stereo?
//! - [`stats`]: typed outbound stats and runtime snapshots
//! - [`dropout`]: throughput tracking and stalled-window detection
//!
//! Nothing here performs I/O or awaits. The session layer feeds these types
//! with data gathered from its collaborators.

pub mod dropout;
pub mod opus_guard;
pub mod stats;
pub mod stereo;

pub use dropout::{DropoutSummary, Throughput, ThroughputSample, ThroughputTracker, MAX_DROPOUT_WINDOWS};
pub use opus_guard::{evaluate_opus_guard, GuardState, OpusGuardReport, NO_LINE_OBSERVED};
pub use stats::{
    CandidatePairStats, CodecSample, CodecSnapshot, CodecStats, OutboundRtpStats, RemoteInboundRtpStats,
    SenderRuntimeSnapshot, StatsEntry, StatsReport, TransportSnapshot, TransportStats,
};
pub use stereo::{evaluate_stereo_gate, GateOutcome, GateState, StereoProbeResult, DEFAULT_STEREO_DIFF_THRESHOLD};
