//! # cleanlink-session-core
//!
//! Stateful half of the guard: everything that talks to the browser through
//! the collaborator traits in [`adapter`].
//!
//! - [`negotiation`]: rewrites descriptions at the offer/answer points
//! - [`registry`] and [`sender`]: tracks connections and tunes audio senders
//! - [`profile`]: `strict` / `compat_fallback` profiles and output gain
//! - [`probe`] and [`gate_check`]: throughput, dropout, codec and stereo
//!   probes and the aggregate pass/fail check
//! - [`constraints`]: capture constraints with voice processing disabled
//!
//! [`GuardSession`] wires these together behind one object.
//!
//! ## Example
//!
//! ```rust
//! use cleanlink_session_core::{GuardSession, NegotiationPoint, SessionDescription};
//!
//! let session = GuardSession::builder().build().unwrap();
//!
//! let offer = SessionDescription::offer(
//!     "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\na=fmtp:111 useinbandfec=1\r\n",
//! );
//! let offer = session.intercept(NegotiationPoint::CreateOffer, offer);
//! assert!(offer.sdp.contains("stereo=1"));
//! assert!(session.opus_guard().pass);
//! ```

pub mod adapter;
pub mod builder;
pub mod config;
pub mod constraints;
pub mod diagnostics;
pub mod errors;
pub mod gate_check;
pub mod logging;
pub mod negotiation;
pub mod probe;
pub mod profile;
pub mod registry;
pub mod sender;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{
    AudioSender, ConnectionState, GainStage, IceConnectionState, PeerConnection, SdpType, SendEncoding,
    SendParameters, SessionDescription, SignalingState, StereoMeter, TrackInfo, TrackKind, TrackState,
};
pub use builder::GuardSessionBuilder;
pub use config::{GuardConfig, LogSettings, ProbeConfig, ProbeWindow, SenderConfig};
pub use constraints::{
    harden_track_constraints, normalize, AudioConstraints, AudioRequest, Constrain, ConstrainRange, ConstraintValue,
    MediaStreamConstraints, SupportedConstraints, VendorProcessing,
};
pub use diagnostics::Diagnostics;
pub use errors::{CollaboratorError, CollaboratorResult, Result, SessionError};
pub use gate_check::{GateCheckReport, SdpGuardCheck};
pub use logging::{setup_logging, LoggingConfig};
pub use negotiation::{auto_context, NegotiationGuard, NegotiationPoint};
pub use probe::{ProbeMode, ProbeRunner, StereoCheck};
pub use profile::{CompatPatchSummary, Profile, ProfileController, ProfileSwitch, MAX_GAIN, MIN_GAIN};
pub use registry::{ConnectionRegistry, ConnectionSummary, PcId, SenderKey};
pub use sender::SenderTuner;
pub use session::{GuardSession, SessionSummary};
