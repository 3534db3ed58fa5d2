//! Builder pattern for creating guard sessions

use std::path::Path;
use std::sync::Arc;

use cleanlink_sdp_core::OpusPolicy;

use crate::adapter::{GainStage, StereoMeter};
use crate::config::{GuardConfig, ProbeConfig};
use crate::constraints::SupportedConstraints;
use crate::errors::Result;
use crate::profile::Profile;
use crate::session::GuardSession;

/// Builder for a [`GuardSession`] with custom configuration and collaborators
pub struct GuardSessionBuilder {
    config: GuardConfig,
    stereo_meter: Option<Arc<dyn StereoMeter>>,
    gain_stage: Option<Arc<dyn GainStage>>,
    supported_constraints: SupportedConstraints,
}

impl Default for GuardSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardSessionBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: GuardConfig::default(),
            stereo_meter: None,
            gain_stage: None,
            supported_constraints: SupportedConstraints::default(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a TOML file
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = GuardConfig::from_file(path)?;
        Ok(self)
    }

    pub fn initial_profile(mut self, profile: Profile) -> Self {
        self.config.initial_profile = profile;
        self
    }

    pub fn initial_gain(mut self, gain: f64) -> Self {
        self.config.initial_gain = gain;
        self
    }

    /// Enforce an explicit policy instead of the music policy
    pub fn opus_policy(mut self, policy: OpusPolicy) -> Self {
        self.config.opus_policy = Some(policy);
        self
    }

    /// Sender cap, and the `maxaveragebitrate` of the default policy
    pub fn target_max_bitrate(mut self, bitrate: u32) -> Self {
        self.config.sender.target_max_bitrate = bitrate;
        self
    }

    /// Enable or disable the sender bitrate/channel hint
    pub fn bitrate_hint(mut self, enabled: bool) -> Self {
        self.config.sender.bitrate_hint = enabled;
        self
    }

    pub fn stereo_diff_threshold(mut self, threshold: f64) -> Self {
        self.config.stereo_diff_threshold = threshold;
        self
    }

    pub fn probes(mut self, probes: ProbeConfig) -> Self {
        self.config.probes = probes;
        self
    }

    /// Collaborator measuring channel difference of a track
    pub fn stereo_meter(mut self, meter: Arc<dyn StereoMeter>) -> Self {
        self.stereo_meter = Some(meter);
        self
    }

    /// Collaborator building compat gain stages
    pub fn gain_stage(mut self, stage: Arc<dyn GainStage>) -> Self {
        self.gain_stage = Some(stage);
        self
    }

    pub fn supported_constraints(mut self, supported: SupportedConstraints) -> Self {
        self.supported_constraints = supported;
        self
    }

    /// Validate the configuration and build the session
    pub fn build(self) -> Result<GuardSession> {
        self.config.validate()?;
        Ok(GuardSession::from_parts(
            self.config,
            self.stereo_meter,
            self.gain_stage,
            self.supported_constraints,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SessionDescription;
    use crate::errors::SessionError;
    use crate::negotiation::NegotiationPoint;

    #[test]
    fn test_build_validates() {
        let err = GuardSessionBuilder::new().initial_gain(7.0).build().err().unwrap();
        assert!(matches!(err, SessionError::Config { .. }));

        let err = GuardSessionBuilder::new().target_max_bitrate(0).build().err().unwrap();
        assert!(matches!(err, SessionError::Config { .. }));
    }

    #[test]
    fn test_builder_settings_reach_session() {
        let session = GuardSessionBuilder::new()
            .initial_profile(Profile::CompatFallback)
            .initial_gain(2.0)
            .target_max_bitrate(96_000)
            .build()
            .unwrap();

        assert_eq!(session.profile(), Profile::CompatFallback);
        assert_eq!(session.gain(), 2.0);
        assert_eq!(session.config().sender.target_max_bitrate, 96_000);
    }

    #[test]
    fn test_target_bitrate_reaches_fmtp_and_sender() {
        let offer = SessionDescription::offer(
            "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\na=fmtp:111 minptime=10\r\n",
        );

        let session = GuardSessionBuilder::new().target_max_bitrate(96_000).build().unwrap();
        let rewritten = session.intercept(NegotiationPoint::CreateOffer, offer.clone());
        assert!(rewritten.sdp.contains("maxaveragebitrate=96000"));
        assert_eq!(session.config().sender.target_max_bitrate, 96_000);
        assert!(session.opus_guard().pass);

        // An explicit policy is left alone
        let explicit = OpusPolicy::from_pairs([("stereo", "1")]).unwrap();
        let session = GuardSessionBuilder::new()
            .target_max_bitrate(96_000)
            .opus_policy(explicit)
            .build()
            .unwrap();
        let rewritten = session.intercept(NegotiationPoint::CreateOffer, offer);
        assert!(!rewritten.sdp.contains("maxaveragebitrate"));
    }
}
