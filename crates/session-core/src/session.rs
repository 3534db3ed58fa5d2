//! Guard session
//!
//! [`GuardSession`] is the single object a browser adapter talks to. It owns
//! the connection registry, the negotiation guard, the profile controller
//! and the probe runner, and forwards adapter events to them:
//!
//! ```text
//! adapter ──intercept()──────────────▶ NegotiationGuard ──▶ sdp-core rewrite
//!         ──register/on_*()──────────▶ ConnectionRegistry + SenderTuner
//!         ──set_profile/set_gain()───▶ ProfileController ──▶ GainStage
//!         ──stats/…/gate_check()─────▶ ProbeRunner ──▶ AudioSender, StereoMeter
//! ```

use std::sync::Arc;

use cleanlink_guard_core::{
    CodecSample, DropoutSummary, GateState, GuardState, OpusGuardReport, StereoProbeResult, ThroughputSample,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::adapter::{
    AudioSender, ConnectionState, GainStage, PeerConnection, SessionDescription, StereoMeter, TrackInfo,
};
use crate::builder::GuardSessionBuilder;
use crate::config::{GuardConfig, ProbeWindow};
use crate::constraints::{self, AudioConstraints, MediaStreamConstraints, SupportedConstraints};
use crate::diagnostics::Diagnostics;
use crate::errors::Result;
use crate::gate_check::{run_gate_check, GateCheckReport};
use crate::negotiation::{auto_context, NegotiationGuard, NegotiationPoint};
use crate::probe::{ProbeRunner, StereoCheck};
use crate::profile::{Profile, ProfileController, ProfileSwitch};
use crate::registry::{ConnectionRegistry, ConnectionSummary, PcId};
use crate::sender::SenderTuner;

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub profile: Profile,
    pub gain: f64,
    pub target_max_bitrate: u32,
    pub stereo_gate: GateState,
    pub last_stereo_probe: Option<StereoProbeResult>,
    pub opus_guard: OpusGuardReport,
    pub guard_state: GuardState,
    pub connections: Vec<ConnectionSummary>,
    pub patched_senders: usize,
    pub last_dropout: Option<DropoutSummary>,
    pub last_gate_check_pass: Option<bool>,
}

/// Runtime guard for the peer connections of one page or client
pub struct GuardSession {
    config: GuardConfig,
    registry: Arc<ConnectionRegistry>,
    diagnostics: Arc<Diagnostics>,
    profiles: Arc<ProfileController>,
    guard: NegotiationGuard,
    tuner: SenderTuner,
    probes: ProbeRunner,
    supported_constraints: SupportedConstraints,
}

impl GuardSession {
    pub fn builder() -> GuardSessionBuilder {
        GuardSessionBuilder::new()
    }

    /// Session with default configuration and no collaborators
    pub fn new() -> Self {
        Self::from_parts(GuardConfig::default(), None, None, SupportedConstraints::default())
    }

    pub(crate) fn from_parts(
        config: GuardConfig,
        stereo_meter: Option<Arc<dyn StereoMeter>>,
        gain_stage: Option<Arc<dyn GainStage>>,
        supported_constraints: SupportedConstraints,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let diagnostics = Arc::new(Diagnostics::new());
        let profiles = Arc::new(ProfileController::new(
            config.initial_profile,
            config.initial_gain,
            Arc::clone(&registry),
            gain_stage,
            Arc::clone(&diagnostics),
        ));
        let probes = ProbeRunner::new(
            Arc::clone(&registry),
            Arc::clone(&diagnostics),
            Arc::clone(&profiles),
            stereo_meter,
            config.stereo_diff_threshold,
        );

        info!(
            "Guard session ready (profile: {}, target bitrate: {})",
            config.initial_profile, config.sender.target_max_bitrate
        );

        Self {
            guard: NegotiationGuard::new(config.effective_opus_policy()),
            tuner: SenderTuner::new(config.sender.clone()),
            config,
            registry,
            diagnostics,
            profiles,
            probes,
            supported_constraints,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    // Connection and sender lifecycle

    /// Start tracking a new peer connection
    pub fn register_connection(&self, pc: Arc<dyn PeerConnection>) -> PcId {
        let pc_id = self.registry.register(pc);
        info!("Tracking peer connection {}", pc_id);
        pc_id
    }

    /// Apply a connection state change
    ///
    /// Closed and failed connections are dropped. Reaching `connected`
    /// re-tunes every audio sender of the connection. Returns whether the
    /// connection is still tracked.
    pub async fn on_connection_state(&self, pc_id: PcId, state: ConnectionState) -> bool {
        let tracked = self.registry.on_connection_state(pc_id, state);
        if tracked && state == ConnectionState::Connected {
            self.tuner
                .refresh_audio_senders(&self.registry, pc_id, "connectionstatechange")
                .await;
        }
        tracked
    }

    pub async fn on_negotiation_needed(&self, pc_id: PcId) -> usize {
        self.tuner
            .refresh_audio_senders(&self.registry, pc_id, "negotiationneeded")
            .await
    }

    pub async fn on_track(&self, pc_id: PcId) -> usize {
        self.tuner.refresh_audio_senders(&self.registry, pc_id, "track").await
    }

    /// Handle a sender created by `addTrack` or `addTransceiver`
    ///
    /// `origin` names the call and becomes the runtime snapshot reason.
    pub async fn on_sender_added(&self, pc_id: PcId, sender: &dyn AudioSender, origin: &str) -> bool {
        self.tuner.on_sender_added(&self.registry, pc_id, sender, origin).await
    }

    /// Forget the gain-stage patch of a sender whose track ended
    pub fn on_sender_track_ended(&self, pc_id: PcId, sender: &dyn AudioSender) {
        let key = self.registry.sender_key(pc_id, sender);
        if self.registry.clear_patched(&key) {
            debug!("Gain stage patch cleared for {}", key);
        }
    }

    // Negotiation

    /// Rewrite a description passing through `point`
    pub fn intercept(&self, point: NegotiationPoint, description: SessionDescription) -> SessionDescription {
        self.guard.intercept(point, description)
    }

    /// Context of a no-argument `setLocalDescription` on `pc_id`
    ///
    /// Unknown connections are treated as generating an offer.
    pub fn auto_context(&self, pc_id: PcId) -> NegotiationPoint {
        self.registry
            .connection(pc_id)
            .map(|pc| auto_context(pc.signaling_state()))
            .unwrap_or(NegotiationPoint::SetLocalDescriptionAutoOffer)
    }

    /// Rewrite a description the browser generated for a no-argument
    /// `setLocalDescription`
    pub fn intercept_auto(&self, pc_id: PcId, description: SessionDescription) -> SessionDescription {
        self.guard.intercept(self.auto_context(pc_id), description)
    }

    pub fn opus_guard(&self) -> OpusGuardReport {
        self.guard.evaluate()
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    // Profile and gain

    pub fn profile(&self) -> Profile {
        self.profiles.profile()
    }

    pub fn set_profile(&self, name: &str) -> Result<ProfileSwitch> {
        self.profiles.set_profile(name)
    }

    pub fn gain(&self) -> f64 {
        self.profiles.gain()
    }

    pub fn set_gain(&self, value: f64) -> Result<f64> {
        self.profiles.set_gain(value)
    }

    /// Track to send for a newly captured track
    pub async fn process_capture_track(&self, track: TrackInfo) -> TrackInfo {
        self.profiles.process_capture_track(track).await
    }

    // Capture constraints

    pub fn normalize_constraints(&self, request: &MediaStreamConstraints) -> MediaStreamConstraints {
        constraints::normalize(request, self.supported_constraints)
    }

    pub fn harden_track_constraints(&self, constraints: &AudioConstraints) -> AudioConstraints {
        constraints::harden_track_constraints(constraints, self.supported_constraints)
    }

    // Probes

    /// Throughput samples; `None` uses the configured stats window
    pub async fn stats(&self, window: Option<ProbeWindow>) -> Vec<ThroughputSample> {
        self.probes.stats(window.unwrap_or(self.config.probes.stats)).await
    }

    pub async fn dropout_probe(&self, window: Option<ProbeWindow>) -> DropoutSummary {
        self.probes
            .dropout_probe(window.unwrap_or(self.config.probes.dropout))
            .await
    }

    pub async fn codec_probe(&self, window: Option<ProbeWindow>) -> Vec<CodecSample> {
        self.probes.codec_probe(window.unwrap_or(self.config.probes.codec)).await
    }

    /// Stereo probe over the configured standalone window
    pub async fn stereo_probe(&self) -> StereoCheck {
        self.probes.stereo_probe(self.config.probes.stereo_window()).await
    }

    /// Full gate check; `None` uses the configured dropout window
    pub async fn gate_check(&self, window: Option<ProbeWindow>) -> GateCheckReport {
        let window = window.unwrap_or(self.config.probes.dropout);
        run_gate_check(&self.probes, &self.guard, &self.config.probes, window).await
    }

    pub fn stereo_gate(&self) -> GateState {
        self.diagnostics.stereo_gate()
    }

    pub fn last_gate_check(&self) -> Option<GateCheckReport> {
        self.diagnostics.last_gate_check()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            profile: self.profile(),
            gain: self.gain(),
            target_max_bitrate: self.tuner.target_max_bitrate(),
            stereo_gate: self.diagnostics.stereo_gate(),
            last_stereo_probe: self.diagnostics.last_stereo_probe(),
            opus_guard: self.guard.evaluate(),
            guard_state: self.guard.state(),
            connections: self.registry.summary(),
            patched_senders: self.registry.patched_count(),
            last_dropout: self.diagnostics.last_dropout(),
            last_gate_check_pass: self.diagnostics.last_gate_check().map(|r| r.pass),
        }
    }
}

impl Default for GuardSession {
    fn default() -> Self {
        Self::new()
    }
}
