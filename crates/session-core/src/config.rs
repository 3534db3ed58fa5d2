//! Session configuration
//!
//! Everything has a default matching the music profile, so an empty TOML
//! document is a valid configuration:
//!
//! ```toml
//! initial_profile = "strict"
//! stereo_diff_threshold = 0.02
//!
//! [sender]
//! bitrate_hint = true
//! target_max_bitrate = 128000
//!
//! [opus_policy]
//! maxaveragebitrate = "128000"
//! stereo = "1"
//!
//! [probes.dropout]
//! interval_ms = 500
//! duration_ms = 12000
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::Path;
use std::time::Duration;

use cleanlink_guard_core::DEFAULT_STEREO_DIFF_THRESHOLD;
use cleanlink_sdp_core::{OpusPolicy, DEFAULT_MAX_AVERAGE_BITRATE};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};
use crate::profile::{Profile, MAX_GAIN, MIN_GAIN};

/// Top-level session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Profile active when the session starts
    pub initial_profile: Profile,
    /// Gain applied by compat gain stages, within `[0, 3]`
    pub initial_gain: f64,
    /// Channel difference below which a stereo track counts as dual mono
    pub stereo_diff_threshold: f64,
    pub sender: SenderConfig,
    /// Required Opus fmtp parameters; the music policy at
    /// `sender.target_max_bitrate` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opus_policy: Option<OpusPolicy>,
    pub probes: ProbeConfig,
    pub logging: LogSettings,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            initial_profile: Profile::Strict,
            initial_gain: 1.0,
            stereo_diff_threshold: DEFAULT_STEREO_DIFF_THRESHOLD,
            sender: SenderConfig::default(),
            opus_policy: None,
            probes: ProbeConfig::default(),
            logging: LogSettings::default(),
        }
    }
}

impl GuardConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GuardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SessionError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Policy the negotiation guard enforces
    ///
    /// An explicit `[opus_policy]` wins; otherwise the music policy carries
    /// the same `maxaveragebitrate` the senders are capped at.
    pub fn effective_opus_policy(&self) -> OpusPolicy {
        match &self.opus_policy {
            Some(policy) => policy.clone(),
            None => OpusPolicy::music_with_bitrate(self.sender.target_max_bitrate),
        }
    }

    /// Check value ranges serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.stereo_diff_threshold) {
            return Err(SessionError::config(format!(
                "stereo_diff_threshold must be within [0, 1], got {}",
                self.stereo_diff_threshold
            )));
        }
        if !self.initial_gain.is_finite() || !(MIN_GAIN..=MAX_GAIN).contains(&self.initial_gain) {
            return Err(SessionError::config(format!(
                "initial_gain must be within [{}, {}], got {}",
                MIN_GAIN, MAX_GAIN, self.initial_gain
            )));
        }
        if self.sender.target_max_bitrate == 0 {
            return Err(SessionError::config("sender.target_max_bitrate must be positive"));
        }
        for (name, window) in self.probes.windows() {
            if window.interval_ms == 0 {
                return Err(SessionError::config(format!("probes.{}.interval_ms must be positive", name)));
            }
        }
        Ok(())
    }
}

/// Sender encoding hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Write `maxBitrate`/`channels` into the first encoding of audio senders
    pub bitrate_hint: bool,
    pub target_max_bitrate: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            bitrate_hint: true,
            target_max_bitrate: DEFAULT_MAX_AVERAGE_BITRATE,
        }
    }
}

/// Polling interval and total duration of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeWindow {
    pub interval_ms: u64,
    pub duration_ms: u64,
}

impl ProbeWindow {
    pub const fn new(interval_ms: u64, duration_ms: u64) -> Self {
        Self {
            interval_ms,
            duration_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Default windows of the diagnostic probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub stats: ProbeWindow,
    pub dropout: ProbeWindow,
    pub codec: ProbeWindow,
    /// Measurement window of a standalone stereo probe
    pub stereo_window_ms: u64,
    /// Measurement window of the stereo probe inside a gate check
    pub gate_stereo_window_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            stats: ProbeWindow::new(2_000, 20_000),
            dropout: ProbeWindow::new(500, 12_000),
            codec: ProbeWindow::new(1_200, 12_000),
            stereo_window_ms: 1_200,
            gate_stereo_window_ms: 1_500,
        }
    }
}

impl ProbeConfig {
    fn windows(&self) -> [(&'static str, ProbeWindow); 3] {
        [("stats", self.stats), ("dropout", self.dropout), ("codec", self.codec)]
    }

    pub fn stereo_window(&self) -> Duration {
        Duration::from_millis(self.stereo_window_ms)
    }

    pub fn gate_stereo_window(&self) -> Duration {
        Duration::from_millis(self.gate_stereo_window_ms)
    }
}

/// Logging options as they appear in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
        }
    }
}
