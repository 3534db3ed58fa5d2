//! # cleanlink - Music-grade Opus for WebRTC sessions
//!
//! Browsers negotiate Opus for speech: mono, discontinuous transmission and
//! a modest bitrate. cleanlink sits between a WebRTC page and its peer
//! connections and keeps an instrument or music signal intact on the way
//! out.
//!
//! ## Overview
//!
//! - **SDP Core**: rewrites Opus `a=fmtp` lines to a fixed parameter policy
//! - **Guard Core**: pure checks over what was negotiated and sent (Opus
//!   guard, stereo gate, stats snapshots, dropout detection)
//! - **Session Core**: connection registry, sender tuning, profiles, probes
//!   and the aggregate gate check behind one [`GuardSession`](session_core::GuardSession)
//!
//! ## Quick Start
//!
//! ```rust
//! use cleanlink::prelude::*;
//!
//! let session = GuardSession::builder().build().unwrap();
//! let answer = session.intercept(
//!     NegotiationPoint::CreateAnswer,
//!     SessionDescription::answer("v=0\r\nm=audio 9 RTP/AVP 111\r\na=rtpmap:111 opus/48000/2\r\n"),
//! );
//! // No fmtp line to rewrite, so the answer is unchanged
//! assert_eq!(answer.sdp, "v=0\r\nm=audio 9 RTP/AVP 111\r\na=rtpmap:111 opus/48000/2\r\n");
//! assert_eq!(session.profile(), Profile::Strict);
//! ```

#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

// Re-export all crates as modules
pub use cleanlink_guard_core as guard_core;
pub use cleanlink_sdp_core as sdp_core;
pub use cleanlink_session_core as session_core;

pub mod prelude {
    //! Common imports for cleanlink integrations

    pub use crate::guard_core::{
        CodecSample, DropoutSummary, GateOutcome, GateState, GuardState, OpusGuardReport, StatsReport,
        StereoProbeResult, ThroughputSample,
    };
    pub use crate::sdp_core::{rewrite, OpusPolicy, ParamMap, RewriteOutcome};
    pub use crate::session_core::{
        AudioSender, CollaboratorError, CollaboratorResult, ConnectionState, GainStage, GateCheckReport,
        GuardConfig, GuardSession, GuardSessionBuilder, NegotiationPoint, PcId, PeerConnection, ProbeWindow,
        Profile, SessionDescription, SessionError, SignalingState, StereoMeter, TrackInfo,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
