//! In-memory collaborators
//!
//! Scriptable implementations of the adapter traits, used by this crate's
//! tests. Enable the `testing` feature to exercise a session without a
//! browser.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cleanlink_guard_core::{CodecStats, OutboundRtpStats, StatsEntry, StatsReport, StereoProbeResult};
use parking_lot::Mutex;

use crate::adapter::{
    AudioSender, ConnectionState, GainStage, IceConnectionState, PeerConnection, SendEncoding, SendParameters,
    SignalingState, StereoMeter, TrackInfo, TrackKind,
};
use crate::errors::{CollaboratorError, CollaboratorResult};

struct ConnectionInner {
    connection_state: ConnectionState,
    signaling_state: SignalingState,
    senders: Vec<Arc<MockSender>>,
    fail_senders: bool,
}

/// Peer connection double
pub struct MockConnection {
    inner: Mutex<ConnectionInner>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ConnectionInner {
                connection_state: ConnectionState::New,
                signaling_state: SignalingState::Stable,
                senders: Vec::new(),
                fail_senders: false,
            }),
        })
    }

    pub fn add_sender(&self, sender: Arc<MockSender>) {
        self.inner.lock().senders.push(sender);
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.inner.lock().connection_state = state;
    }

    pub fn set_signaling_state(&self, state: SignalingState) {
        self.inner.lock().signaling_state = state;
    }

    /// Make every sender enumeration fail
    pub fn fail_senders(&self) {
        self.inner.lock().fail_senders = true;
    }
}

impl PeerConnection for MockConnection {
    fn connection_state(&self) -> ConnectionState {
        self.inner.lock().connection_state
    }

    fn ice_connection_state(&self) -> IceConnectionState {
        match self.connection_state() {
            ConnectionState::Connected => IceConnectionState::Connected,
            ConnectionState::Failed => IceConnectionState::Failed,
            ConnectionState::Closed => IceConnectionState::Closed,
            _ => IceConnectionState::New,
        }
    }

    fn signaling_state(&self) -> SignalingState {
        self.inner.lock().signaling_state
    }

    fn senders(&self) -> CollaboratorResult<Vec<Arc<dyn AudioSender>>> {
        let inner = self.inner.lock();
        if inner.fail_senders {
            return Err(CollaboratorError::failed("getSenders", "connection is gone"));
        }
        Ok(inner
            .senders
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn AudioSender>)
            .collect())
    }
}

struct SenderInner {
    track: Option<TrackInfo>,
    parameters: SendParameters,
    bytes_sent: u64,
    packets_sent: u64,
    bytes_per_poll: u64,
    packets_per_poll: u64,
    fail_stats: bool,
    fail_set_parameters: bool,
    fail_replace_track: bool,
    replace_supported: bool,
    replaced_tracks: Vec<TrackInfo>,
}

/// RTP sender double
///
/// Every stats poll advances the cumulative counters by the configured
/// traffic step and returns a report with one Opus outbound stream.
pub struct MockSender {
    id: String,
    inner: Mutex<SenderInner>,
    set_parameters_calls: AtomicUsize,
    stats_calls: AtomicUsize,
    music_hints: AtomicUsize,
}

impl MockSender {
    fn with_track(id: &str, track: Option<TrackInfo>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            inner: Mutex::new(SenderInner {
                track,
                parameters: SendParameters {
                    encodings: vec![SendEncoding {
                        max_bitrate: None,
                        channels: None,
                        active: true,
                    }],
                    degradation_preference: None,
                },
                bytes_sent: 0,
                packets_sent: 0,
                bytes_per_poll: 8_000,
                packets_per_poll: 25,
                fail_stats: false,
                fail_set_parameters: false,
                fail_replace_track: false,
                replace_supported: true,
                replaced_tracks: Vec::new(),
            }),
            set_parameters_calls: AtomicUsize::new(0),
            stats_calls: AtomicUsize::new(0),
            music_hints: AtomicUsize::new(0),
        })
    }

    /// Sender carrying a live stereo 48 kHz audio track
    pub fn audio(id: &str, label: &str) -> Arc<Self> {
        let track = TrackInfo::audio(format!("{}-track", id), label).with_settings(Some(2), Some(48_000));
        Self::with_track(id, Some(track))
    }

    pub fn video(id: &str) -> Arc<Self> {
        let mut track = TrackInfo::audio(format!("{}-track", id), "camera");
        track.kind = TrackKind::Video;
        Self::with_track(id, Some(track))
    }

    /// Sender without a track
    pub fn empty(id: &str) -> Arc<Self> {
        Self::with_track(id, None)
    }

    pub fn set_track(&self, track: Option<TrackInfo>) {
        self.inner.lock().track = track;
    }

    pub fn set_parameters_value(&self, parameters: SendParameters) {
        self.inner.lock().parameters = parameters;
    }

    /// Counter increments applied on each stats poll
    pub fn set_traffic(&self, bytes_per_poll: u64, packets_per_poll: u64) {
        let mut inner = self.inner.lock();
        inner.bytes_per_poll = bytes_per_poll;
        inner.packets_per_poll = packets_per_poll;
    }

    pub fn fail_stats(&self) {
        self.inner.lock().fail_stats = true;
    }

    pub fn fail_set_parameters(&self) {
        self.inner.lock().fail_set_parameters = true;
    }

    pub fn fail_replace_track(&self) {
        self.inner.lock().fail_replace_track = true;
    }

    pub fn disable_replace_track(&self) {
        self.inner.lock().replace_supported = false;
    }

    pub fn parameters(&self) -> SendParameters {
        self.inner.lock().parameters.clone()
    }

    pub fn replaced_tracks(&self) -> Vec<TrackInfo> {
        self.inner.lock().replaced_tracks.clone()
    }

    pub fn set_parameters_calls(&self) -> usize {
        self.set_parameters_calls.load(Ordering::SeqCst)
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn music_hints(&self) -> usize {
        self.music_hints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSender for MockSender {
    fn sender_id(&self) -> String {
        self.id.clone()
    }

    fn track(&self) -> Option<TrackInfo> {
        self.inner.lock().track.clone()
    }

    fn get_parameters(&self) -> CollaboratorResult<SendParameters> {
        Ok(self.inner.lock().parameters.clone())
    }

    async fn set_parameters(&self, parameters: SendParameters) -> CollaboratorResult<()> {
        self.set_parameters_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        if inner.fail_set_parameters {
            return Err(CollaboratorError::failed("setParameters", "InvalidModificationError"));
        }
        inner.parameters = parameters;
        Ok(())
    }

    async fn get_stats(&self) -> CollaboratorResult<StatsReport> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        if inner.fail_stats {
            return Err(CollaboratorError::failed("getStats", "sender is stopped"));
        }
        inner.bytes_sent += inner.bytes_per_poll;
        inner.packets_sent += inner.packets_per_poll;

        let outbound = OutboundRtpStats {
            id: format!("OT-{}", self.id),
            kind: Some("audio".to_string()),
            bytes_sent: Some(inner.bytes_sent),
            packets_sent: Some(inner.packets_sent),
            payload_type: Some(111),
            codec_id: Some("CO-111".to_string()),
            ..Default::default()
        };
        let codec = CodecStats {
            id: "CO-111".to_string(),
            mime_type: Some("audio/opus".to_string()),
            clock_rate: Some(48_000),
            channels: Some(2),
            payload_type: Some(111),
            sdp_fmtp_line: None,
        };
        Ok(StatsReport::new(vec![StatsEntry::OutboundRtp(outbound), StatsEntry::Codec(codec)]))
    }

    fn supports_replace_track(&self) -> bool {
        self.inner.lock().replace_supported
    }

    async fn replace_track(&self, track: TrackInfo) -> CollaboratorResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_replace_track {
            return Err(CollaboratorError::failed("replaceTrack", "InvalidStateError"));
        }
        inner.replaced_tracks.push(track.clone());
        inner.track = Some(track);
        Ok(())
    }

    fn set_music_hint(&self) {
        self.music_hints.fetch_add(1, Ordering::SeqCst);
    }
}

/// Stereo meter double returning a fixed outcome
pub struct MockStereoMeter {
    result: Mutex<CollaboratorResult<Option<StereoProbeResult>>>,
    calls: AtomicUsize,
}

impl MockStereoMeter {
    pub fn returning(result: Option<StereoProbeResult>) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Ok(result)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Err(CollaboratorError::unsupported("AudioContext"))),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StereoMeter for MockStereoMeter {
    async fn measure(&self, _track: &TrackInfo, window: Duration) -> CollaboratorResult<Option<StereoProbeResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.result.lock().clone();
        tokio::time::sleep(window).await;
        result
    }
}

/// Gain stage double
pub struct MockGainStage {
    stages: Mutex<Vec<f64>>,
    fail_attach: Mutex<bool>,
}

impl MockGainStage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stages: Mutex::new(Vec::new()),
            fail_attach: Mutex::new(false),
        })
    }

    pub fn fail_attach(&self) {
        *self.fail_attach.lock() = true;
    }

    /// Current gain of every attached stage
    pub fn gains(&self) -> Vec<f64> {
        self.stages.lock().clone()
    }
}

#[async_trait]
impl GainStage for MockGainStage {
    async fn attach(&self, track: &TrackInfo, gain: f64) -> CollaboratorResult<TrackInfo> {
        if *self.fail_attach.lock() {
            return Err(CollaboratorError::failed("createMediaStreamSource", "NotAllowedError"));
        }
        self.stages.lock().push(gain);
        let mut processed = TrackInfo::audio(format!("{}-gain", track.id), "MediaStreamAudioDestinationNode");
        processed.channel_count = track.channel_count;
        processed.sample_rate = track.sample_rate;
        Ok(processed)
    }

    fn set_gain(&self, gain: f64) -> usize {
        let mut stages = self.stages.lock();
        stages.iter_mut().for_each(|g| *g = gain);
        stages.len()
    }
}
