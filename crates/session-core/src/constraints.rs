//! Capture constraint normalization
//!
//! Capture requests are rewritten so the browser delivers the raw device
//! signal: every processing stage is switched off, both the W3C flags and the
//! legacy `goog*` vendor flags, and stereo 48 kHz low-latency capture is
//! requested. Everything else in the request, the device id in particular,
//! is left as it was.
//!
//! Recognized options are typed fields of [`AudioConstraints`]; anything
//! else is carried through untouched in [`AudioConstraints::other`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Untyped constraint value, for options this module does not interpret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<ConstraintValue>),
    Object(BTreeMap<String, ConstraintValue>),
}

/// `exact`/`ideal`/`min`/`max` form of a constraint
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ConstrainRange<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideal: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<T>,
}

/// A constraint given either as a bare value or as a range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constrain<T> {
    Value(T),
    Range(ConstrainRange<T>),
}

impl<T> Constrain<T> {
    /// `{ "ideal": value }`
    pub fn ideal(value: T) -> Self {
        Constrain::Range(ConstrainRange {
            exact: None,
            ideal: Some(value),
            min: None,
            max: None,
        })
    }
}

fn off() -> Option<Constrain<bool>> {
    Some(Constrain::Value(false))
}

/// Legacy Chromium processing flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VendorProcessing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_echo_cancellation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_auto_gain_control: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_auto_gain_control2: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_noise_suppression: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_noise_suppression2: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_highpass_filter: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_typing_noise_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_ducking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_noise_reduction: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_audio_mirroring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_experimental_auto_gain_control: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_experimental_noise_suppression: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goog_experimental_echo_cancellation: Option<bool>,
}

impl VendorProcessing {
    /// Every vendor flag set to `false`
    pub fn disabled() -> Self {
        let off = Some(false);
        Self {
            goog_echo_cancellation: off,
            goog_auto_gain_control: off,
            goog_auto_gain_control2: off,
            goog_noise_suppression: off,
            goog_noise_suppression2: off,
            goog_highpass_filter: off,
            goog_typing_noise_detection: off,
            goog_ducking: off,
            goog_noise_reduction: off,
            goog_audio_mirroring: off,
            goog_experimental_auto_gain_control: off,
            goog_experimental_noise_suppression: off,
            goog_experimental_echo_cancellation: off,
        }
    }
}

/// Audio track constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<ConstraintValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo_cancellation: Option<Constrain<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_gain_control: Option<Constrain<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_suppression: Option<Constrain<bool>>,
    /// Only touched where the browser reports support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_isolation: Option<Constrain<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_count: Option<Constrain<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<Constrain<u32>>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<Constrain<f64>>,
    #[serde(flatten)]
    pub vendor: VendorProcessing,
    /// Options not interpreted here
    #[serde(flatten)]
    pub other: BTreeMap<String, ConstraintValue>,
}

impl AudioConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    fn disable_w3c_processing(&mut self, supported: SupportedConstraints) {
        self.echo_cancellation = off();
        self.auto_gain_control = off();
        self.noise_suppression = off();
        if supported.voice_isolation {
            self.voice_isolation = off();
        }
    }
}

/// The `audio` member of a capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioRequest {
    Enabled(bool),
    Constraints(AudioConstraints),
}

/// A `getUserMedia` style capture request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaStreamConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<ConstraintValue>,
}

/// Constraints the browser reports as supported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupportedConstraints {
    pub voice_isolation: bool,
}

fn normalize_audio(audio: &AudioConstraints, supported: SupportedConstraints) -> AudioConstraints {
    let mut normalized = audio.clone();
    normalized.disable_w3c_processing(supported);
    normalized.vendor = VendorProcessing::disabled();
    normalized.channel_count = Some(Constrain::ideal(2));
    normalized.sample_rate = Some(Constrain::ideal(48_000));
    normalized.latency = Some(Constrain::ideal(0.01));
    normalized
}

/// Rewrite a capture request for unprocessed stereo capture
///
/// Requests without audio, or with `audio: false`, are returned unchanged.
/// `audio: true` becomes a full constraint set.
pub fn normalize(request: &MediaStreamConstraints, supported: SupportedConstraints) -> MediaStreamConstraints {
    let audio = match &request.audio {
        None | Some(AudioRequest::Enabled(false)) => return request.clone(),
        Some(AudioRequest::Enabled(true)) => normalize_audio(&AudioConstraints::new(), supported),
        Some(AudioRequest::Constraints(audio)) => normalize_audio(audio, supported),
    };

    MediaStreamConstraints {
        audio: Some(AudioRequest::Constraints(audio)),
        video: request.video.clone(),
    }
}

/// Constraints to re-apply on a live audio track
///
/// Only the W3C processing flags are forced; vendor flags and quality hints
/// are capture-time only.
pub fn harden_track_constraints(constraints: &AudioConstraints, supported: SupportedConstraints) -> AudioConstraints {
    let mut hardened = constraints.clone();
    hardened.disable_w3c_processing(supported);
    hardened
}
