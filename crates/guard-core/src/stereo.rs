//! Stereo integrity gate
//!
//! Classifies one stereo probe snapshot into a [`GateState`]. The probe
//! itself (spectral energy comparison of the two channels) is done by an
//! external measurement collaborator; this module only consumes its result.
//!
//! Classification order:
//!
//! 1. no probe                                  -> `fail_no_probe`
//! 2. channel count known and below 2           -> `fail_mono_track`
//! 3. channel difference known and below limit  -> `fail_dual_mono`
//! 4. probe carries a warning                   -> `unknown`
//! 5. otherwise                                 -> `pass`

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default normalized channel difference below which stereo is considered
/// collapsed to dual mono
pub const DEFAULT_STEREO_DIFF_THRESHOLD: f64 = 0.02;

/// Result of one stereo measurement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoProbeResult {
    /// Channel count reported by the track settings
    pub channel_count: Option<u32>,
    /// Normalized inter-channel energy difference in `[0, 1]`
    pub normalized_channel_difference: Option<f64>,
    /// Measurement caveat, e.g. no energy during the window
    pub warning: Option<String>,
    /// Sample rate reported by the track settings
    pub sample_rate: Option<u32>,
    /// Number of analysis frames taken
    pub samples: u32,
    /// Label of the probed track
    pub track_label: Option<String>,
}

impl StereoProbeResult {
    /// Probe result with just the two gating measurements
    pub fn new(channel_count: Option<u32>, normalized_channel_difference: Option<f64>) -> Self {
        Self {
            channel_count,
            normalized_channel_difference,
            ..Default::default()
        }
    }

    /// Probe result that could not measure anything
    pub fn inconclusive(warning: impl Into<String>) -> Self {
        Self {
            warning: Some(warning.into()),
            ..Default::default()
        }
    }

    /// Attach a warning
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// Build a result from accumulated per-bin energy totals
    ///
    /// `diff_energy` is the sum of absolute left/right magnitude differences
    /// and `total_energy` the sum of the per-bin maxima over the window. The
    /// normalized difference is rounded to six decimals. Zero total energy
    /// yields no difference and an "inconclusive" warning.
    pub fn from_energy_totals(
        channel_count: Option<u32>,
        sample_rate: Option<u32>,
        diff_energy: f64,
        total_energy: f64,
        samples: u32,
        threshold: f64,
    ) -> Self {
        let normalized = (total_energy > 0.0)
            .then(|| ((diff_energy / total_energy) * 1e6).round() / 1e6);

        let warning = match normalized {
            None => Some("No audio energy detected during probe; stereo check inconclusive."),
            Some(_) if channel_count.is_some_and(|c| c < 2) => {
                Some("Track is not reporting stereo channelCount.")
            }
            Some(diff) if diff < threshold => {
                Some("Channels look nearly identical (possible dual-mono collapse).")
            }
            Some(_) => None,
        };

        Self {
            channel_count,
            normalized_channel_difference: normalized,
            warning: warning.map(str::to_string),
            sample_rate,
            samples,
            track_label: None,
        }
    }
}

/// Stereo gate classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// Not evaluated yet, or the probe was inconclusive
    #[default]
    Unknown,
    /// Stereo verified
    Pass,
    /// No probe result was available
    FailNoProbe,
    /// No active outbound audio sender to probe
    FailNoSender,
    /// The track itself is mono
    FailMonoTrack,
    /// Both channels carry the same signal
    FailDualMono,
}

impl GateOutcome {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Unknown => "unknown",
            GateOutcome::Pass => "pass",
            GateOutcome::FailNoProbe => "fail_no_probe",
            GateOutcome::FailNoSender => "fail_no_sender",
            GateOutcome::FailMonoTrack => "fail_mono_track",
            GateOutcome::FailDualMono => "fail_dual_mono",
        }
    }

    /// Whether this is [`GateOutcome::Pass`]
    pub fn is_pass(&self) -> bool {
        matches!(self, GateOutcome::Pass)
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current stereo gate classification and its reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateState {
    /// The classification
    pub outcome: GateOutcome,
    /// Human readable explanation, absent on pass and on reset
    pub reason: Option<String>,
}

impl GateState {
    /// Reset state: `unknown` with no reason
    pub fn unknown() -> Self {
        Self::default()
    }

    /// State used when no outbound sender exists to probe
    pub fn no_sender() -> Self {
        Self::new(GateOutcome::FailNoSender, Some("No active outbound audio sender.".to_string()))
    }

    fn new(outcome: GateOutcome, reason: Option<String>) -> Self {
        Self { outcome, reason }
    }

    /// Whether the gate passed
    pub fn is_pass(&self) -> bool {
        self.outcome.is_pass()
    }
}

/// Classify a stereo probe result
///
/// Total: every input maps to exactly one state.
///
/// # Examples
///
/// ```
/// use cleanlink_guard_core::stereo::{evaluate_stereo_gate, GateOutcome, StereoProbeResult};
///
/// let mono = StereoProbeResult::new(Some(1), None);
/// assert_eq!(evaluate_stereo_gate(Some(&mono), 0.02).outcome, GateOutcome::FailMonoTrack);
///
/// let stereo = StereoProbeResult::new(Some(2), Some(0.5));
/// assert!(evaluate_stereo_gate(Some(&stereo), 0.02).is_pass());
/// ```
pub fn evaluate_stereo_gate(probe: Option<&StereoProbeResult>, threshold: f64) -> GateState {
    let Some(probe) = probe else {
        return GateState::new(GateOutcome::FailNoProbe, Some("Stereo probe unavailable.".to_string()));
    };

    if let Some(channels) = probe.channel_count.filter(|c| *c < 2) {
        return GateState::new(
            GateOutcome::FailMonoTrack,
            Some(format!("Track reports channelCount={}; expected stereo.", channels)),
        );
    }

    if let Some(diff) = probe.normalized_channel_difference.filter(|d| *d < threshold) {
        return GateState::new(
            GateOutcome::FailDualMono,
            Some(format!("Channel difference {} is below threshold {}.", diff, threshold)),
        );
    }

    if let Some(warning) = &probe.warning {
        return GateState::new(GateOutcome::Unknown, Some(warning.clone()));
    }

    GateState::new(GateOutcome::Pass, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(probe: &StereoProbeResult) -> GateState {
        evaluate_stereo_gate(Some(probe), DEFAULT_STEREO_DIFF_THRESHOLD)
    }

    #[test]
    fn test_no_probe() {
        let state = evaluate_stereo_gate(None, DEFAULT_STEREO_DIFF_THRESHOLD);
        assert_eq!(state.outcome, GateOutcome::FailNoProbe);
        assert!(state.reason.is_some());
    }

    #[test]
    fn test_mono_track() {
        let state = gate(&StereoProbeResult::new(Some(1), None));
        assert_eq!(state.outcome, GateOutcome::FailMonoTrack);
        assert_eq!(state.reason.as_deref(), Some("Track reports channelCount=1; expected stereo."));
    }

    #[test]
    fn test_mono_wins_over_dual_mono() {
        let state = gate(&StereoProbeResult::new(Some(1), Some(0.0)));
        assert_eq!(state.outcome, GateOutcome::FailMonoTrack);
    }

    #[test]
    fn test_dual_mono() {
        let state = gate(&StereoProbeResult::new(Some(2), Some(0.005)));
        assert_eq!(state.outcome, GateOutcome::FailDualMono);
        let reason = state.reason.unwrap();
        assert!(reason.contains("0.005"));
        assert!(reason.contains("0.02"));
    }

    #[test]
    fn test_pass() {
        let state = gate(&StereoProbeResult::new(Some(2), Some(0.5)));
        assert_eq!(state.outcome, GateOutcome::Pass);
        assert_eq!(state.reason, None);

        // Unknown channel count does not block a clear difference
        assert!(gate(&StereoProbeResult::new(None, Some(0.3))).is_pass());
    }

    #[test]
    fn test_warning_keeps_unknown() {
        let probe = StereoProbeResult::inconclusive("AudioContext is suspended");
        let state = gate(&probe);
        assert_eq!(state.outcome, GateOutcome::Unknown);
        assert_eq!(state.reason.as_deref(), Some("AudioContext is suspended"));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(gate(&StereoProbeResult::new(Some(2), Some(0.02))).is_pass());
        let custom = evaluate_stereo_gate(Some(&StereoProbeResult::new(Some(2), Some(0.04))), 0.05);
        assert_eq!(custom.outcome, GateOutcome::FailDualMono);
    }

    #[test]
    fn test_from_energy_totals() {
        let silent = StereoProbeResult::from_energy_totals(Some(2), Some(48000), 0.0, 0.0, 15, 0.02);
        assert_eq!(silent.normalized_channel_difference, None);
        assert_eq!(gate(&silent).outcome, GateOutcome::Unknown);

        let wide = StereoProbeResult::from_energy_totals(Some(2), Some(48000), 1.0, 3.0, 15, 0.02);
        assert_eq!(wide.normalized_channel_difference, Some(0.333333));
        assert_eq!(wide.warning, None);
        assert!(gate(&wide).is_pass());

        let collapsed = StereoProbeResult::from_energy_totals(Some(2), None, 0.001, 1.0, 15, 0.02);
        assert!(collapsed.warning.is_some());
        assert_eq!(gate(&collapsed).outcome, GateOutcome::FailDualMono);
    }

    #[test]
    fn test_outcome_serde_names() {
        let json = serde_json::to_string(&GateOutcome::FailDualMono).unwrap();
        assert_eq!(json, "\"fail_dual_mono\"");
        assert_eq!(GateOutcome::FailNoSender.to_string(), "fail_no_sender");
        assert_eq!(GateState::no_sender().outcome, GateOutcome::FailNoSender);
    }
}
