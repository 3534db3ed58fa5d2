//! Latest diagnostic results of a session

use cleanlink_guard_core::{DropoutSummary, GateState, StereoProbeResult};
use parking_lot::Mutex;

use crate::gate_check::GateCheckReport;

#[derive(Default)]
struct DiagnosticsInner {
    stereo_gate: GateState,
    last_stereo_probe: Option<StereoProbeResult>,
    last_dropout: Option<DropoutSummary>,
    last_gate_check: Option<GateCheckReport>,
}

/// Shared store of gate state and last probe results
#[derive(Default)]
pub struct Diagnostics {
    inner: Mutex<DiagnosticsInner>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stereo_gate(&self) -> GateState {
        self.inner.lock().stereo_gate.clone()
    }

    /// Store a gate classification; the probe is kept only when present
    pub fn set_stereo_gate(&self, gate: GateState, probe: Option<StereoProbeResult>) {
        let mut inner = self.inner.lock();
        inner.stereo_gate = gate;
        if probe.is_some() {
            inner.last_stereo_probe = probe;
        }
    }

    /// Back to `unknown` without a reason
    pub fn reset_stereo_gate(&self) {
        self.inner.lock().stereo_gate = GateState::unknown();
    }

    pub fn last_stereo_probe(&self) -> Option<StereoProbeResult> {
        self.inner.lock().last_stereo_probe.clone()
    }

    pub fn record_dropout(&self, summary: DropoutSummary) {
        self.inner.lock().last_dropout = Some(summary);
    }

    pub fn last_dropout(&self) -> Option<DropoutSummary> {
        self.inner.lock().last_dropout.clone()
    }

    pub fn record_gate_check(&self, report: GateCheckReport) {
        self.inner.lock().last_gate_check = Some(report);
    }

    pub fn last_gate_check(&self) -> Option<GateCheckReport> {
        self.inner.lock().last_gate_check.clone()
    }
}
