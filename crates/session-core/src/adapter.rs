//! Collaborator interfaces
//!
//! The session never talks to a browser directly. A host adapter implements
//! these traits over whatever objects it wraps (real WebRTC handles, a test
//! double, a recording replay) and hands them to the session.
//!
//! Synchronous methods mirror browser getters that cannot suspend. Anything
//! that returns a promise in the browser is `async` here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cleanlink_guard_core::{StatsReport, StereoProbeResult};
use serde::{Deserialize, Serialize};

use crate::errors::CollaboratorResult;

/// SDP description type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// A session description as passed through negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(sdp_type: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            sdp_type,
            sdp: sdp.into(),
        }
    }

    pub fn offer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Offer, sdp)
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self::new(SdpType::Answer, sdp)
    }
}

/// Peer connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// Closed or failed connections are dropped from the registry
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }
}

/// ICE connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Offer/answer signaling state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Live,
    Ended,
}

/// What the session needs to know about a media track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
    pub ready_state: TrackState,
    pub channel_count: Option<u32>,
    pub sample_rate: Option<u32>,
}

impl TrackInfo {
    /// A live audio track
    pub fn audio(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TrackKind::Audio,
            label: label.into(),
            ready_state: TrackState::Live,
            channel_count: None,
            sample_rate: None,
        }
    }

    pub fn with_settings(mut self, channel_count: Option<u32>, sample_rate: Option<u32>) -> Self {
        self.channel_count = channel_count;
        self.sample_rate = sample_rate;
        self
    }

    pub fn ended(mut self) -> Self {
        self.ready_state = TrackState::Ended;
        self
    }

    pub fn is_audio(&self) -> bool {
        self.kind == TrackKind::Audio
    }

    pub fn is_live(&self) -> bool {
        self.ready_state == TrackState::Live
    }
}

/// One entry of a sender's `encodings`
///
/// `channels` is `None` when the browser does not expose the field at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEncoding {
    pub max_bitrate: Option<u32>,
    pub channels: Option<u32>,
    pub active: bool,
}

/// Sender parameters as read and written through the sender
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendParameters {
    pub encodings: Vec<SendEncoding>,
    pub degradation_preference: Option<String>,
}

/// An RTP sender of a peer connection
#[async_trait]
pub trait AudioSender: Send + Sync {
    /// Stable identifier of the sender within its connection
    fn sender_id(&self) -> String;

    /// Currently attached track, if any
    fn track(&self) -> Option<TrackInfo>;

    fn get_parameters(&self) -> CollaboratorResult<SendParameters>;

    async fn set_parameters(&self, parameters: SendParameters) -> CollaboratorResult<()>;

    async fn get_stats(&self) -> CollaboratorResult<StatsReport>;

    /// Whether [`AudioSender::replace_track`] is available
    fn supports_replace_track(&self) -> bool {
        true
    }

    async fn replace_track(&self, track: TrackInfo) -> CollaboratorResult<()>;

    /// Mark the attached track's content as music, where supported
    fn set_music_hint(&self) {}
}

/// A peer connection
pub trait PeerConnection: Send + Sync {
    fn connection_state(&self) -> ConnectionState;

    fn ice_connection_state(&self) -> IceConnectionState;

    fn signaling_state(&self) -> SignalingState;

    fn senders(&self) -> CollaboratorResult<Vec<Arc<dyn AudioSender>>>;
}

/// Measures inter-channel difference of a track over a time window
#[async_trait]
pub trait StereoMeter: Send + Sync {
    /// `Ok(None)` when no measurement could be taken at all
    async fn measure(&self, track: &TrackInfo, window: Duration) -> CollaboratorResult<Option<StereoProbeResult>>;
}

/// Inserts and drives a gain stage in front of outgoing tracks
#[async_trait]
pub trait GainStage: Send + Sync {
    /// Route `track` through a new gain stage, returning the processed track
    async fn attach(&self, track: &TrackInfo, gain: f64) -> CollaboratorResult<TrackInfo>;

    /// Update every active stage, returning how many were updated
    fn set_gain(&self, gain: f64) -> usize;
}
