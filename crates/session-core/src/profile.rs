//! Operating profiles and output gain
//!
//! `strict` keeps the pure transport path: no processing is inserted between
//! the capture and the sender. `compat_fallback` routes audio through a gain
//! stage. Switching to it retrofits a stage onto every live sender in a
//! background task; switching back leaves existing stages in place until
//! their tracks restart.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapter::{GainStage, TrackInfo};
use crate::diagnostics::Diagnostics;
use crate::errors::{Result, SessionError};
use crate::registry::{ConnectionRegistry, SenderParameterSnapshot};

pub const MIN_GAIN: f64 = 0.0;
pub const MAX_GAIN: f64 = 3.0;

/// Named operating profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Strict,
    CompatFallback,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Strict, Profile::CompatFallback];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Strict => "strict",
            Profile::CompatFallback => "compat_fallback",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    pub fn is_compat(&self) -> bool {
        matches!(self, Profile::CompatFallback)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| SessionError::unknown_profile(s, Profile::default()))
    }
}

/// Clamp a gain value into `[MIN_GAIN, MAX_GAIN]`
pub fn clamp_gain(value: f64) -> f64 {
    value.clamp(MIN_GAIN, MAX_GAIN)
}

/// Outcome of retrofitting gain stages onto live senders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompatPatchSummary {
    pub attempted: usize,
    pub patched: usize,
    pub errors: usize,
}

/// Result of a successful profile switch
#[derive(Debug)]
pub struct ProfileSwitch {
    pub profile: Profile,
    /// Background retrofit task, only when switching to `compat_fallback`
    /// inside a tokio runtime
    pub compat_patch: Option<JoinHandle<CompatPatchSummary>>,
}

/// Owns the active profile and the gain value
pub struct ProfileController {
    profile: Mutex<Profile>,
    gain: Arc<Mutex<f64>>,
    registry: Arc<ConnectionRegistry>,
    gain_stage: Option<Arc<dyn GainStage>>,
    diagnostics: Arc<Diagnostics>,
}

impl ProfileController {
    pub fn new(
        profile: Profile,
        gain: f64,
        registry: Arc<ConnectionRegistry>,
        gain_stage: Option<Arc<dyn GainStage>>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            profile: Mutex::new(profile),
            gain: Arc::new(Mutex::new(clamp_gain(gain))),
            registry,
            gain_stage,
            diagnostics,
        }
    }

    pub fn profile(&self) -> Profile {
        *self.profile.lock()
    }

    pub fn gain(&self) -> f64 {
        *self.gain.lock()
    }

    /// Switch to the profile called `name`
    ///
    /// Unknown names and the already active profile are rejected and the
    /// current profile stays. A switch resets the stereo gate to `unknown`.
    /// Switching to `compat_fallback` spawns the live-sender retrofit and
    /// returns without awaiting it.
    pub fn set_profile(&self, name: &str) -> Result<ProfileSwitch> {
        let next = {
            let mut profile = self.profile.lock();
            let Some(next) = Profile::from_name(name) else {
                let available: Vec<&str> = Profile::ALL.iter().map(Profile::as_str).collect();
                warn!("Unknown profile \"{}\". Available: {}", name, available.join(", "));
                return Err(SessionError::unknown_profile(name, *profile));
            };
            if next == *profile {
                info!("Profile already active: {}", next);
                return Err(SessionError::ProfileAlreadyActive { profile: next });
            }
            *profile = next;
            next
        };

        self.diagnostics.reset_stereo_gate();

        let compat_patch = if next.is_compat() {
            info!("Profile switched to \"{}\": gain stage on new captures and best-effort live retrofit", next);
            self.spawn_compat_patch()
        } else {
            info!("Profile switched to \"{}\": existing gain stages remain until track restart", next);
            None
        };

        Ok(ProfileSwitch {
            profile: next,
            compat_patch,
        })
    }

    fn spawn_compat_patch(&self) -> Option<JoinHandle<CompatPatchSummary>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; live gain stage retrofit skipped");
            return None;
        };

        let registry = Arc::clone(&self.registry);
        let gain_stage = self.gain_stage.clone();
        let gain = Arc::clone(&self.gain);

        Some(handle.spawn(async move {
            let gain = *gain.lock();
            let summary = patch_active_senders(&registry, gain_stage.as_deref(), gain).await;
            if summary.patched > 0 {
                info!(
                    "compat_fallback live retrofit patched {}/{} active sender(s)",
                    summary.patched, summary.attempted
                );
            } else if summary.attempted > 0 {
                warn!(
                    "compat_fallback live retrofit could not patch active senders ({}/{} errors); a republish may be required",
                    summary.errors, summary.attempted
                );
            }
            summary
        }))
    }

    /// Run the live-sender retrofit in place
    pub async fn compat_patch_active_senders(&self) -> CompatPatchSummary {
        if !self.profile().is_compat() {
            return CompatPatchSummary::default();
        }
        let gain = self.gain();
        patch_active_senders(&self.registry, self.gain_stage.as_deref(), gain).await
    }

    /// Route a new capture track through a gain stage under `compat_fallback`
    ///
    /// Returns the track to send: the processed one, or the original when
    /// the profile is `strict` or no stage could be attached.
    pub async fn process_capture_track(&self, track: TrackInfo) -> TrackInfo {
        if !self.profile().is_compat() || !track.is_audio() {
            return track;
        }
        let Some(stage) = self.gain_stage.as_deref() else {
            warn!("compat_fallback: no gain stage available, capture left unprocessed");
            return track;
        };
        let gain = self.gain();
        match stage.attach(&track, gain).await {
            Ok(processed) => {
                info!("compat_fallback: gain stage active ({:.2}x)", gain);
                processed
            }
            Err(e) => {
                warn!("compat_fallback: failed to attach gain stage: {}", e);
                track
            }
        }
    }

    /// Set the output gain, clamped to `[0, 3]`, and push it to all stages
    ///
    /// Non-finite values are rejected and the current gain is kept.
    pub fn set_gain(&self, value: f64) -> Result<f64> {
        if !value.is_finite() {
            let current = self.gain();
            warn!("Gain requires a finite number, keeping {:.2}", current);
            return Err(SessionError::InvalidGain { value, current });
        }

        let gain = clamp_gain(value);
        *self.gain.lock() = gain;

        let updated = self.gain_stage.as_deref().map(|s| s.set_gain(gain)).unwrap_or(0);
        if updated == 0 {
            if self.profile().is_compat() {
                info!("Gain set to {:.2}x; applies when a compat_fallback stream is active", gain);
            } else {
                info!("Gain set to {:.2}x; strict profile has no live gain stage", gain);
            }
        } else {
            info!("Gain applied to {} active stage(s): {:.2}x", updated, gain);
        }
        Ok(gain)
    }
}

async fn patch_active_senders(
    registry: &ConnectionRegistry,
    gain_stage: Option<&dyn GainStage>,
    gain: f64,
) -> CompatPatchSummary {
    let active = registry.active_audio_senders();
    if active.is_empty() {
        return CompatPatchSummary::default();
    }

    let Some(stage) = gain_stage else {
        return CompatPatchSummary {
            attempted: active.len(),
            patched: 0,
            errors: active.len(),
        };
    };

    let mut summary = CompatPatchSummary::default();
    for entry in active {
        if registry.is_patched(&entry.key) || !entry.sender.supports_replace_track() {
            continue;
        }
        summary.attempted += 1;

        let processed = match stage.attach(&entry.track, gain).await {
            Ok(processed) => processed,
            Err(e) => {
                summary.errors += 1;
                warn!("compat_fallback: gain stage for {} failed: {}", entry.key, e);
                continue;
            }
        };

        if let Err(e) = entry.sender.replace_track(processed.clone()).await {
            summary.errors += 1;
            warn!("compat_fallback: replaceTrack for {} failed: {}", entry.key, e);
            continue;
        }

        entry.sender.set_music_hint();
        registry.mark_patched(&entry.key);
        if let Ok(parameters) = entry.sender.get_parameters() {
            registry.record_parameters(&entry.key, SenderParameterSnapshot::new(Some(&processed), &parameters));
        }
        summary.patched += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnection, MockGainStage, MockSender};
    use cleanlink_guard_core::{GateOutcome, GateState};

    struct Fixture {
        controller: ProfileController,
        stage: Arc<MockGainStage>,
        diagnostics: Arc<Diagnostics>,
        pc: Arc<MockConnection>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let diagnostics = Arc::new(Diagnostics::new());
        let stage = MockGainStage::new();
        let pc = MockConnection::new();
        registry.register(pc.clone());
        let controller = ProfileController::new(
            Profile::Strict,
            1.0,
            registry,
            Some(stage.clone() as Arc<dyn GainStage>),
            diagnostics.clone(),
        );
        Fixture {
            controller,
            stage,
            diagnostics,
            pc,
        }
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::from_name("compat_fallback"), Some(Profile::CompatFallback));
        assert_eq!(Profile::from_name("Strict"), None);
        assert_eq!("strict".parse::<Profile>().unwrap(), Profile::Strict);
        assert_eq!(serde_json::to_string(&Profile::CompatFallback).unwrap(), "\"compat_fallback\"");
    }

    #[test]
    fn test_rejected_switches_keep_profile() {
        let f = fixture();
        let err = f.controller.set_profile("turbo").unwrap_err();
        assert_eq!(err.retained_profile(), Some(Profile::Strict));

        let err = f.controller.set_profile("strict").unwrap_err();
        assert!(matches!(err, SessionError::ProfileAlreadyActive { profile: Profile::Strict }));
        assert_eq!(f.controller.profile(), Profile::Strict);
    }

    #[test]
    fn test_switch_resets_gate_without_runtime() {
        let f = fixture();
        f.diagnostics.set_stereo_gate(GateState::no_sender(), None);

        let switch = f.controller.set_profile("compat_fallback").unwrap();
        assert_eq!(switch.profile, Profile::CompatFallback);
        assert!(switch.compat_patch.is_none());
        assert_eq!(f.diagnostics.stereo_gate(), GateState::unknown());
        assert_eq!(f.diagnostics.stereo_gate().outcome, GateOutcome::Unknown);
    }

    #[tokio::test]
    async fn test_compat_switch_patches_live_senders() {
        let f = fixture();
        let patchable = MockSender::audio("s-1", "mic");
        let fixed = MockSender::audio("s-2", "line");
        fixed.disable_replace_track();
        let broken = MockSender::audio("s-3", "usb");
        broken.fail_replace_track();
        f.pc.add_sender(patchable.clone());
        f.pc.add_sender(fixed.clone());
        f.pc.add_sender(broken.clone());

        let switch = f.controller.set_profile("compat_fallback").unwrap();
        let summary = switch.compat_patch.unwrap().await.unwrap();
        assert_eq!(
            summary,
            CompatPatchSummary {
                attempted: 2,
                patched: 1,
                errors: 1
            }
        );
        assert_eq!(patchable.replaced_tracks().len(), 1);
        assert_eq!(patchable.replaced_tracks()[0].id, "s-1-track-gain");
        assert!(fixed.replaced_tracks().is_empty());

        // Already patched senders are skipped
        let again = f.controller.compat_patch_active_senders().await;
        assert_eq!(again.patched, 0);
        assert_eq!(again.attempted, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gain_changes_while_retrofit_runs_on_worker() {
        let f = fixture();
        f.pc.add_sender(MockSender::audio("s-1", "mic"));

        let switch = f.controller.set_profile("compat_fallback").unwrap();
        assert_eq!(f.controller.set_gain(2.0).unwrap(), 2.0);

        let summary = switch.compat_patch.unwrap().await.unwrap();
        assert_eq!(summary.patched, 1);
        assert_eq!(f.controller.gain(), 2.0);
    }

    #[tokio::test]
    async fn test_without_gain_stage_every_sender_errors() {
        let registry = Arc::new(ConnectionRegistry::new());
        let pc = MockConnection::new();
        pc.add_sender(MockSender::audio("s-1", "mic"));
        pc.add_sender(MockSender::audio("s-2", "mic"));
        registry.register(pc);
        let controller =
            ProfileController::new(Profile::CompatFallback, 1.0, registry, None, Arc::new(Diagnostics::new()));

        let summary = controller.compat_patch_active_senders().await;
        assert_eq!(
            summary,
            CompatPatchSummary {
                attempted: 2,
                patched: 0,
                errors: 2
            }
        );
    }

    #[tokio::test]
    async fn test_capture_processing_follows_profile() {
        let f = fixture();
        let track = TrackInfo::audio("cap-1", "M-Game");

        let unchanged = f.controller.process_capture_track(track.clone()).await;
        assert_eq!(unchanged, track);

        f.controller.set_profile("compat_fallback").unwrap();
        let processed = f.controller.process_capture_track(track.clone()).await;
        assert_eq!(processed.id, "cap-1-gain");
        assert_eq!(f.stage.gains(), vec![1.0]);
    }

    #[test]
    fn test_gain_is_clamped_and_pushed() {
        let f = fixture();
        assert_eq!(f.controller.set_gain(5.0).unwrap(), 3.0);
        assert_eq!(f.controller.set_gain(-1.0).unwrap(), 0.0);
        assert_eq!(f.controller.set_gain(1.25).unwrap(), 1.25);

        let err = f.controller.set_gain(f64::NAN).unwrap_err();
        assert!(matches!(err, SessionError::InvalidGain { current, .. } if current == 1.25));
        assert_eq!(f.controller.gain(), 1.25);
    }

    #[tokio::test]
    async fn test_gain_reaches_active_stages() {
        let f = fixture();
        f.controller.set_profile("compat_fallback").unwrap();
        f.controller
            .process_capture_track(TrackInfo::audio("cap-1", "mic"))
            .await;
        f.controller.set_gain(2.0).unwrap();
        assert_eq!(f.stage.gains(), vec![2.0]);
    }
}
