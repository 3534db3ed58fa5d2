//! Diagnostic probe loops
//!
//! Each loop polls the stats of every active audio sender at a fixed
//! interval until its deadline. Senders are re-enumerated on every iteration
//! so renegotiation and track replacement show up in the samples.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cleanlink_guard_core::{
    evaluate_stereo_gate, CodecSample, DropoutSummary, GateState, SenderRuntimeSnapshot, StereoProbeResult,
    ThroughputSample, ThroughputTracker,
};
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::adapter::StereoMeter;
use crate::config::ProbeWindow;
use crate::diagnostics::Diagnostics;
use crate::profile::{Profile, ProfileController};
use crate::registry::{ActiveSender, ConnectionRegistry};

/// Warning recorded when no stereo meter is installed
pub const METER_UNAVAILABLE: &str = "Stereo meter unavailable";

/// Which loop produced a sample; also the runtime snapshot reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeMode {
    Stats,
    DropoutProbe,
    CodecProbe,
}

impl ProbeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMode::Stats => "stats",
            ProbeMode::DropoutProbe => "dropout-probe",
            ProbeMode::CodecProbe => "codec-probe",
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a stereo probe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StereoCheck {
    /// Measurement, absent when there was nothing to measure
    pub probe: Option<StereoProbeResult>,
    pub gate: GateState,
}

/// Runs probes against the senders of a registry
pub struct ProbeRunner {
    registry: Arc<ConnectionRegistry>,
    diagnostics: Arc<Diagnostics>,
    profiles: Arc<ProfileController>,
    stereo_meter: Option<Arc<dyn StereoMeter>>,
    stereo_threshold: f64,
}

impl ProbeRunner {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        diagnostics: Arc<Diagnostics>,
        profiles: Arc<ProfileController>,
        stereo_meter: Option<Arc<dyn StereoMeter>>,
        stereo_threshold: f64,
    ) -> Self {
        Self {
            registry,
            diagnostics,
            profiles,
            stereo_meter,
            stereo_threshold,
        }
    }

    pub fn profile(&self) -> Profile {
        self.profiles.profile()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Poll every live sender once per interval until the deadline
    ///
    /// `visit` receives each sender together with a runtime snapshot built
    /// from the one stats report fetched for it in that iteration, and the
    /// time elapsed since the loop started.
    async fn poll_senders<F>(&self, mode: ProbeMode, window: ProbeWindow, mut visit: F)
    where
        F: FnMut(&ActiveSender, &SenderRuntimeSnapshot, Duration),
    {
        let started = Instant::now();
        let deadline = started + window.duration();
        let mut saw_sender = false;

        while Instant::now() < deadline {
            let senders = self.registry.active_audio_senders();
            saw_sender |= !senders.is_empty();

            for entry in senders {
                if !entry.track.is_live() {
                    continue;
                }
                let report = match entry.sender.get_stats().await {
                    Ok(report) => report,
                    Err(e) => {
                        warn!("{}: getStats failed for {}: {}", mode, entry.pc_id, e);
                        continue;
                    }
                };
                let Some(snapshot) = SenderRuntimeSnapshot::from_report(&report, mode.as_str(), Utc::now()) else {
                    continue;
                };
                self.registry.record_runtime(&entry.key, snapshot.clone());
                visit(&entry, &snapshot, started.elapsed());
            }

            sleep(window.interval()).await;
        }

        if !saw_sender {
            warn!("{}: no active outbound audio senders during probe window", mode);
        }
    }

    async fn throughput(&self, mode: ProbeMode, window: ProbeWindow) -> Vec<ThroughputSample> {
        let mut tracker = ThroughputTracker::new();
        let mut samples = Vec::new();

        self.poll_senders(mode, window, |entry, snapshot, elapsed| {
            let key = format!("{}:{}", entry.pc_id.0, entry.track.id);
            let throughput = tracker.observe(&key, elapsed, snapshot.bytes_sent, snapshot.packets_sent);
            let sample = ThroughputSample {
                elapsed_ms: elapsed.as_millis() as u64,
                pc_id: entry.pc_id.0,
                track_id: Some(entry.track.id.clone()),
                track_label: Some(entry.track.label.clone()),
                kbps: throughput.kbps,
                bytes: snapshot.bytes_sent,
                packets: snapshot.packets_sent,
                dropped: throughput.dropped,
            };
            debug!("{} {}: {:.2} kbps (dropped: {})", mode, key, sample.kbps, sample.dropped);
            samples.push(sample);
        })
        .await;

        samples
    }

    /// Throughput samples of every live sender
    pub async fn stats(&self, window: ProbeWindow) -> Vec<ThroughputSample> {
        let samples = self.throughput(ProbeMode::Stats, window).await;
        info!("Stats completed with {} samples", samples.len());
        samples
    }

    /// Look for polling windows where nothing was sent
    ///
    /// The summary is stored as the session's last dropout result.
    pub async fn dropout_probe(&self, window: ProbeWindow) -> DropoutSummary {
        let samples = self.throughput(ProbeMode::DropoutProbe, window).await;
        let summary = DropoutSummary::from_samples(&samples);

        if summary.dropouts > 0 {
            warn!(
                "Dropout probe detected {} stalled outbound window(s) over {} samples",
                summary.dropouts, summary.samples
            );
        } else {
            info!("Dropout probe found no stalled outbound windows ({} samples)", summary.samples);
        }

        self.diagnostics.record_dropout(summary.clone());
        summary
    }

    /// Negotiated codec of every live sender over time
    pub async fn codec_probe(&self, window: ProbeWindow) -> Vec<CodecSample> {
        let mut samples = Vec::new();

        self.poll_senders(ProbeMode::CodecProbe, window, |entry, snapshot, _| {
            let sample = CodecSample::from_snapshot(
                snapshot,
                entry.pc_id.0,
                Some(entry.track.id.clone()),
                Some(entry.track.label.clone()),
            );
            if !sample.is_opus() {
                debug!("codec-probe: {} is sending {:?}", entry.key, sample.codec_mime_type);
            }
            samples.push(sample);
        })
        .await;

        info!("Codec probe completed with {} samples", samples.len());
        samples
    }

    /// Measure the first active audio sender and update the stereo gate
    pub async fn stereo_probe(&self, window: Duration) -> StereoCheck {
        let target = self
            .registry
            .active_audio_senders()
            .into_iter()
            .find(|entry| entry.track.is_live());

        let Some(target) = target else {
            warn!("Stereo probe: no active outbound audio track to inspect");
            let gate = GateState::no_sender();
            self.diagnostics.set_stereo_gate(gate.clone(), None);
            return StereoCheck { probe: None, gate };
        };

        let probe = match self.stereo_meter.as_deref() {
            None => {
                warn!("Stereo probe: {}", METER_UNAVAILABLE);
                let mut probe = StereoProbeResult::inconclusive(METER_UNAVAILABLE);
                probe.track_label = Some(target.track.label.clone());
                Some(probe)
            }
            Some(meter) => match meter.measure(&target.track, window).await {
                Ok(probe) => probe,
                Err(e) => {
                    warn!("Stereo probe failed for {}: {}", target.key, e);
                    None
                }
            },
        };

        if let Some(probe) = probe.as_ref() {
            info!(
                "stereo-probe {}: channels={:?} diff={:?} warning={:?}",
                target.key, probe.channel_count, probe.normalized_channel_difference, probe.warning
            );
        }

        let gate = self.evaluate_stereo(probe.clone());
        StereoCheck { probe, gate }
    }

    /// Classify a probe result and store it as the session's stereo gate
    ///
    /// Under the `strict` profile every non-passing result is logged as an
    /// error together with the fallback profile to switch to.
    pub fn evaluate_stereo(&self, probe: Option<StereoProbeResult>) -> GateState {
        let gate = evaluate_stereo_gate(probe.as_ref(), self.stereo_threshold);
        self.diagnostics.set_stereo_gate(gate.clone(), probe);

        if !gate.is_pass() && self.profile() == Profile::Strict {
            error!(
                state = %gate.outcome,
                reason = gate.reason.as_deref().unwrap_or(""),
                "Strict stereo gate failed. Switch profile with set_profile(\"{}\") for immediate fallback",
                Profile::CompatFallback
            );
        }
        gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::TrackInfo;
    use crate::testing::{MockConnection, MockSender, MockStereoMeter};
    use cleanlink_guard_core::GateOutcome;

    fn runner(meter: Option<Arc<MockStereoMeter>>) -> (ProbeRunner, Arc<MockConnection>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let diagnostics = Arc::new(Diagnostics::new());
        let profiles = Arc::new(ProfileController::new(
            Profile::Strict,
            1.0,
            registry.clone(),
            None,
            diagnostics.clone(),
        ));
        let pc = MockConnection::new();
        registry.register(pc.clone());
        let meter = meter.map(|m| m as Arc<dyn StereoMeter>);
        (ProbeRunner::new(registry, diagnostics, profiles, meter, 0.02), pc)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_samples_every_interval() {
        let (runner, pc) = runner(None);
        pc.add_sender(MockSender::audio("s-1", "mic"));

        let samples = runner.stats(ProbeWindow::new(500, 2_000)).await;
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].kbps, 0.0);
        assert!(!samples[0].dropped);
        // 8000 bytes per 500 ms
        assert_eq!(samples[1].kbps, 128.0);
        assert_eq!(samples[1].elapsed_ms, 500);
        assert_eq!(samples[3].bytes, 32_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_and_failing_senders_are_skipped() {
        let (runner, pc) = runner(None);
        let ended = MockSender::audio("s-1", "mic");
        ended.set_track(Some(TrackInfo::audio("s-1-track", "mic").ended()));
        let failing = MockSender::audio("s-2", "mic");
        failing.fail_stats();
        pc.add_sender(ended.clone());
        pc.add_sender(failing);

        let samples = runner.stats(ProbeWindow::new(500, 1_000)).await;
        assert!(samples.is_empty());
        assert_eq!(ended.stats_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_window_yields_no_samples() {
        let (runner, _pc) = runner(None);
        let summary = runner.dropout_probe(ProbeWindow::new(500, 1_500)).await;
        assert_eq!(summary, DropoutSummary::default());
        assert!(!summary.passed());
        assert_eq!(runner.diagnostics().last_dropout(), Some(summary));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_sender_is_a_dropout() {
        let (runner, pc) = runner(None);
        let sender = MockSender::audio("s-1", "mic");
        sender.set_traffic(0, 0);
        pc.add_sender(sender);

        let summary = runner.dropout_probe(ProbeWindow::new(500, 12_000)).await;
        assert_eq!(summary.samples, 24);
        assert_eq!(summary.dropouts, 23);
        assert_eq!(summary.dropout_windows.len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_codec_probe_records_runtime() {
        let (runner, pc) = runner(None);
        let sender = MockSender::audio("s-1", "mic");
        pc.add_sender(sender.clone());

        let samples = runner.codec_probe(ProbeWindow::new(1_200, 12_000)).await;
        assert_eq!(samples.len(), 10);
        assert!(samples.iter().all(CodecSample::is_opus));
        assert_eq!(samples[0].codec_channels, Some(2));
        assert_eq!(sender.stats_calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stereo_probe_without_sender() {
        let meter = MockStereoMeter::returning(None);
        let (runner, _pc) = runner(Some(meter.clone()));

        let check = runner.stereo_probe(Duration::from_millis(1_200)).await;
        assert_eq!(check.gate.outcome, GateOutcome::FailNoSender);
        assert!(check.probe.is_none());
        assert_eq!(meter.calls(), 0);
        assert_eq!(runner.diagnostics().stereo_gate(), check.gate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stereo_probe_outcomes() {
        let meter = MockStereoMeter::returning(Some(StereoProbeResult::new(Some(2), Some(0.005))));
        let (runner, pc) = runner(Some(meter.clone()));
        pc.add_sender(MockSender::audio("s-1", "mic"));

        let check = runner.stereo_probe(Duration::from_millis(1_200)).await;
        assert_eq!(check.gate.outcome, GateOutcome::FailDualMono);
        assert_eq!(meter.calls(), 1);
        assert_eq!(runner.diagnostics().last_stereo_probe(), check.probe);
    }

    #[tokio::test(start_paused = true)]
    async fn test_meter_failure_is_no_probe() {
        let (runner, pc) = runner(Some(MockStereoMeter::failing()));
        pc.add_sender(MockSender::audio("s-1", "mic"));

        let check = runner.stereo_probe(Duration::from_millis(1_200)).await;
        assert_eq!(check.gate.outcome, GateOutcome::FailNoProbe);
        assert!(runner.diagnostics().last_stereo_probe().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_meter_is_inconclusive() {
        let (runner, pc) = runner(None);
        pc.add_sender(MockSender::audio("s-1", "mic"));

        let check = runner.stereo_probe(Duration::from_millis(1_200)).await;
        assert_eq!(check.gate.outcome, GateOutcome::Unknown);
        assert_eq!(check.gate.reason.as_deref(), Some(METER_UNAVAILABLE));
        assert_eq!(check.probe.unwrap().track_label.as_deref(), Some("mic"));
    }
}
