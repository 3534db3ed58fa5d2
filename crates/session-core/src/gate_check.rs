//! One-shot pass/fail check of a live session

use std::time::Duration;

use chrono::{DateTime, Utc};
use cleanlink_guard_core::{DropoutSummary, GateOutcome, StereoProbeResult};
use cleanlink_sdp_core::ParamMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ProbeConfig, ProbeWindow};
use crate::negotiation::NegotiationGuard;
use crate::probe::ProbeRunner;
use crate::profile::Profile;

/// Lower bound of the codec probe interval inside a gate check
const MIN_CODEC_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound of the codec probe duration inside a gate check
const MAX_CODEC_DURATION: Duration = Duration::from_secs(12);

/// Opus guard part of a gate check report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SdpGuardCheck {
    pub pass: bool,
    pub reason: Option<String>,
    pub parsed: ParamMap,
    pub last_opus_fmtp_applied: Option<String>,
    pub applied_count: u64,
}

/// Result of [`run_gate_check`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateCheckReport {
    pub pass: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub profile: Profile,
    pub dropout: DropoutSummary,
    pub stereo_probe: Option<StereoProbeResult>,
    pub stereo_gate_state: GateOutcome,
    pub stereo_gate_reason: Option<String>,
    /// Number of codec probe samples
    pub codec_samples: usize,
    pub sdp_guard: SdpGuardCheck,
    /// One message per failed check, in check order
    pub failures: Vec<String>,
}

/// Codec probe window derived from the dropout window
pub fn codec_window(window: ProbeWindow) -> ProbeWindow {
    let interval = (window.interval() * 2).max(MIN_CODEC_INTERVAL);
    let duration = window.duration().min(MAX_CODEC_DURATION);
    ProbeWindow::new(interval.as_millis() as u64, duration.as_millis() as u64)
}

/// Run dropout, stereo and codec probes, then the Opus guard
///
/// Every check runs even when an earlier one failed. The report is stored
/// as the session's last gate check.
pub async fn run_gate_check(
    runner: &ProbeRunner,
    guard: &NegotiationGuard,
    probes: &ProbeConfig,
    window: ProbeWindow,
) -> GateCheckReport {
    let started_at = Utc::now();
    let mut failures = Vec::new();

    let dropout = runner.dropout_probe(window).await;
    if !dropout.passed() {
        failures.push(format!(
            "Dropout probe failed ({} stalled windows over {} samples).",
            dropout.dropouts, dropout.samples
        ));
    }

    let stereo = runner.stereo_probe(probes.gate_stereo_window()).await;
    if !stereo.gate.is_pass() {
        match stereo.gate.reason.as_deref() {
            Some(reason) => failures.push(format!("Stereo gate failed ({}: {}).", stereo.gate.outcome, reason)),
            None => failures.push(format!("Stereo gate failed ({}).", stereo.gate.outcome)),
        }
    }

    let codec = runner.codec_probe(codec_window(window)).await;
    if codec.is_empty() {
        failures.push("Codec probe collected no outbound audio samples.".to_string());
    }

    let guard_state = guard.state();
    let opus = guard.evaluate();
    if !opus.pass {
        failures.push(format!(
            "Opus SDP guard failed: {}",
            opus.reason.as_deref().unwrap_or("unknown reason")
        ));
    }

    let profile = runner.profile();
    let report = GateCheckReport {
        pass: failures.is_empty(),
        started_at,
        completed_at: Utc::now(),
        profile,
        dropout,
        stereo_probe: stereo.probe,
        stereo_gate_state: stereo.gate.outcome,
        stereo_gate_reason: stereo.gate.reason,
        codec_samples: codec.len(),
        sdp_guard: SdpGuardCheck {
            pass: opus.pass,
            reason: opus.reason,
            parsed: opus.parsed,
            last_opus_fmtp_applied: guard_state.last_applied_line().map(str::to_string),
            applied_count: guard_state.applied_count(),
        },
        failures,
    };

    if report.pass {
        info!("Gate check passed");
    } else {
        warn!("Gate check failed: {}", report.failures.join(" "));
        if profile == Profile::Strict {
            warn!("Recommended fallback: set_profile(\"{}\")", Profile::CompatFallback);
        }
    }

    runner.diagnostics().record_gate_check(report.clone());
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_window() {
        assert_eq!(codec_window(ProbeWindow::new(500, 12_000)), ProbeWindow::new(1_000, 12_000));
        assert_eq!(codec_window(ProbeWindow::new(200, 30_000)), ProbeWindow::new(1_000, 12_000));
        assert_eq!(codec_window(ProbeWindow::new(800, 4_000)), ProbeWindow::new(1_600, 4_000));
    }
}
