//! # cleanlink-sdp-core
//!
//! Text-level SDP rewriting for music-grade Opus negotiation.
//!
//! Browsers negotiate Opus with voice-call defaults: mono, DTX on, modest
//! bitrates. This crate rewrites the `a=fmtp` lines of Opus payload types in
//! an offer or answer so that the negotiated parameters match a fixed
//! [`OpusPolicy`], without touching anything else in the session
//! description.
//!
//! ## Layers
//!
//! - [`parser`]: `nom` grammars for `a=rtpmap` and `a=fmtp` lines
//! - [`section`]: splits SDP into media sections and finds Opus payload types
//! - [`fmtp`]: parameter string codec ([`ParamMap`])
//! - [`policy`]: the target parameter policy and the merge rule
//! - [`rewriter`]: ties the above together over a whole SDP blob
//!
//! ## Usage
//!
//! ```rust
//! use cleanlink_sdp_core::{rewrite, OpusPolicy};
//!
//! let offer = "v=0\r\n\
//! m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
//! a=rtpmap:111 opus/48000/2\r\n\
//! a=fmtp:111 minptime=10;useinbandfec=1\r\n";
//!
//! let outcome = rewrite(offer, &OpusPolicy::music(), "createOffer");
//! assert_eq!(outcome.changed_count, 1);
//! assert!(outcome.sdp.contains("stereo=1"));
//! assert!(outcome.sdp.contains("usedtx=0"));
//! ```

pub mod error;
pub mod fmtp;
pub mod parser;
pub mod policy;
pub mod rewriter;
pub mod section;

pub use error::{Result, SdpError};
pub use fmtp::{FmtpLine, ParamMap};
pub use policy::{merge, OpusPolicy, DEFAULT_MAX_AVERAGE_BITRATE, DEPRECATED_KEYS};
pub use rewriter::{rewrite, RewriteOutcome};
pub use section::{LineEnding, MediaSection, SdpDocument};
