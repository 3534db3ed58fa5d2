//! Opus SDP guard state and evaluation
//!
//! [`GuardState`] remembers what the rewriter last did during a session.
//! [`evaluate_opus_guard`] checks that the last applied fmtp line actually
//! carries every policy value. A failure here is a diagnostic, not an error:
//! browsers may still silently ignore parameters after a successful rewrite,
//! and that is only visible on a later negotiation round.

use cleanlink_sdp_core::{OpusPolicy, ParamMap, RewriteOutcome, DEPRECATED_KEYS};
use serde::Serialize;
use tracing::debug;

/// Reason reported before any Opus fmtp line was rewritten
pub const NO_LINE_OBSERVED: &str = "No Opus fmtp line has been observed by the SDP guard yet.";

/// Session-lifetime record of SDP rewrites
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuardState {
    last_applied_line: Option<String>,
    applied_count: u64,
    last_context: Option<String>,
}

impl GuardState {
    /// Empty state for a new session
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rewrite; outcomes that changed nothing leave the state as is
    ///
    /// Returns whether the state was updated.
    pub fn record(&mut self, outcome: &RewriteOutcome, context: &str) -> bool {
        if outcome.changed_count == 0 {
            return false;
        }

        self.last_applied_line = outcome.last_changed_line.clone();
        self.applied_count += outcome.changed_count as u64;
        self.last_context = Some(context.to_string());

        debug!(
            "SDP guard applied {} line(s) via {} (total {})",
            outcome.changed_count, context, self.applied_count
        );
        true
    }

    /// Last fmtp line written by the rewriter
    pub fn last_applied_line(&self) -> Option<&str> {
        self.last_applied_line.as_deref()
    }

    /// Total number of lines rewritten this session
    pub fn applied_count(&self) -> u64 {
        self.applied_count
    }

    /// Negotiation step of the most recent rewrite
    pub fn last_context(&self) -> Option<&str> {
        self.last_context.as_deref()
    }

    /// Evaluate the last applied line against `policy`
    pub fn evaluate(&self, policy: &OpusPolicy) -> OpusGuardReport {
        evaluate_opus_guard(self.last_applied_line(), policy)
    }
}

/// Outcome of an Opus guard evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpusGuardReport {
    /// Whether every policy key matched and no deprecated key remained
    pub pass: bool,
    /// Why the guard failed
    pub reason: Option<String>,
    /// Parameters parsed from the evaluated line
    pub parsed: ParamMap,
}

impl OpusGuardReport {
    fn fail(reason: impl Into<String>, parsed: ParamMap) -> Self {
        Self {
            pass: false,
            reason: Some(reason.into()),
            parsed,
        }
    }
}

/// Check an fmtp line against the required policy
///
/// Fails when no line was observed, when a policy key is missing or has a
/// different value (the first offending key is named), or when a deprecated
/// key such as `cbr` is still present.
pub fn evaluate_opus_guard(last_line: Option<&str>, policy: &OpusPolicy) -> OpusGuardReport {
    let Some(line) = last_line else {
        return OpusGuardReport::fail(NO_LINE_OBSERVED, ParamMap::new());
    };

    let parsed = ParamMap::parse(line);

    for (key, expected) in policy.iter() {
        if parsed.get(key) != Some(expected) {
            let reason = format!("Opus fmtp missing expected {}={}.", key, expected);
            return OpusGuardReport::fail(reason, parsed);
        }
    }

    if let Some(key) = DEPRECATED_KEYS.iter().find(|key| parsed.contains_key(key)) {
        let reason = format!("Opus fmtp still includes {} parameter.", key);
        return OpusGuardReport::fail(reason, parsed);
    }

    OpusGuardReport {
        pass: true,
        reason: None,
        parsed,
    }
}
