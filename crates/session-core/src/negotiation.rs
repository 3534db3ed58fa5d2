//! Negotiation guard
//!
//! The signaling adapter passes every description through
//! [`NegotiationGuard::intercept`] at the points where a browser would hand
//! SDP to the peer or apply it locally. The guard rewrites Opus fmtp lines to
//! the session policy and keeps the [`GuardState`] used by later checks.

use std::fmt;

use cleanlink_guard_core::{GuardState, OpusGuardReport};
use cleanlink_sdp_core::{rewrite, OpusPolicy};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::adapter::{SessionDescription, SignalingState};

/// Where in the offer/answer flow a description was intercepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationPoint {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
    /// Local description generated for a no-argument set, as an offer
    SetLocalDescriptionAutoOffer,
    /// Local description generated for a no-argument set, as an answer
    SetLocalDescriptionAutoAnswer,
}

impl NegotiationPoint {
    /// Context label recorded in the guard state
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationPoint::CreateOffer => "createOffer",
            NegotiationPoint::CreateAnswer => "createAnswer",
            NegotiationPoint::SetLocalDescription => "setLocalDescription",
            NegotiationPoint::SetRemoteDescription => "setRemoteDescription",
            NegotiationPoint::SetLocalDescriptionAutoOffer => "setLocalDescription-auto-offer",
            NegotiationPoint::SetLocalDescriptionAutoAnswer => "setLocalDescription-auto-answer",
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(
            self,
            NegotiationPoint::SetLocalDescriptionAutoOffer | NegotiationPoint::SetLocalDescriptionAutoAnswer
        )
    }
}

impl fmt::Display for NegotiationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context for a no-argument `setLocalDescription`
///
/// With a remote offer pending the browser generates an answer, otherwise an
/// offer.
pub fn auto_context(signaling_state: SignalingState) -> NegotiationPoint {
    match signaling_state {
        SignalingState::HaveRemoteOffer => NegotiationPoint::SetLocalDescriptionAutoAnswer,
        _ => NegotiationPoint::SetLocalDescriptionAutoOffer,
    }
}

/// Rewrites descriptions and remembers what it did
pub struct NegotiationGuard {
    policy: OpusPolicy,
    state: Mutex<GuardState>,
}

impl NegotiationGuard {
    pub fn new(policy: OpusPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(GuardState::new()),
        }
    }

    pub fn policy(&self) -> &OpusPolicy {
        &self.policy
    }

    /// Rewrite `description` for `point`
    ///
    /// The description type is never altered. Descriptions without SDP text
    /// pass through as is.
    pub fn intercept(&self, point: NegotiationPoint, description: SessionDescription) -> SessionDescription {
        if description.sdp.is_empty() {
            return description;
        }

        let outcome = rewrite(&description.sdp, &self.policy, point.as_str());
        if !outcome.is_changed() {
            return description;
        }

        self.state.lock().record(&outcome, point.as_str());
        if point.is_auto() {
            info!("SDP guard applied before no-argument setLocalDescription ({})", point);
        }

        SessionDescription {
            sdp_type: description.sdp_type,
            sdp: outcome.sdp,
        }
    }

    /// Copy of the current guard state
    pub fn state(&self) -> GuardState {
        self.state.lock().clone()
    }

    /// Check the last applied fmtp line against the policy
    pub fn evaluate(&self) -> OpusGuardReport {
        self.state.lock().evaluate(&self.policy)
    }
}
