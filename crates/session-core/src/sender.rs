//! Sender encoding tuner and snapshots
//!
//! Best effort only: every collaborator failure is logged and treated as
//! "nothing changed".

use std::sync::Arc;

use chrono::Utc;
use cleanlink_guard_core::SenderRuntimeSnapshot;
use tracing::{debug, info, warn};

use crate::adapter::AudioSender;
use crate::config::SenderConfig;
use crate::registry::{ConnectionRegistry, PcId, SenderParameterSnapshot};

/// Channel count requested on encodings that expose the field
const STEREO_CHANNELS: u32 = 2;

/// Record the sender's current parameters
pub fn capture_parameters(registry: &ConnectionRegistry, pc_id: PcId, sender: &dyn AudioSender) {
    let Some(track) = sender.track().filter(|t| t.is_audio()) else {
        return;
    };
    match sender.get_parameters() {
        Ok(parameters) => {
            let key = registry.sender_key(pc_id, sender);
            registry.record_parameters(&key, SenderParameterSnapshot::new(Some(&track), &parameters));
        }
        Err(e) => debug!("getParameters failed for {}: {}", pc_id, e),
    }
}

/// Read the sender's stats and record a runtime snapshot
///
/// Returns `None` for non-audio senders, failed stats calls and reports
/// without an outbound audio stream.
pub async fn capture_runtime(
    registry: &ConnectionRegistry,
    pc_id: PcId,
    sender: &dyn AudioSender,
    reason: &str,
) -> Option<SenderRuntimeSnapshot> {
    sender.track().filter(|t| t.is_audio())?;

    let report = match sender.get_stats().await {
        Ok(report) => report,
        Err(e) => {
            warn!("sender.getStats failed for {}: {}", pc_id, e);
            return None;
        }
    };

    let snapshot = SenderRuntimeSnapshot::from_report(&report, reason, Utc::now())?;
    let key = registry.sender_key(pc_id, sender);
    registry.record_runtime(&key, snapshot.clone());
    Some(snapshot)
}

/// Applies the bitrate and channel hint to audio senders
#[derive(Debug, Clone)]
pub struct SenderTuner {
    config: SenderConfig,
}

impl SenderTuner {
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    pub fn target_max_bitrate(&self) -> u32 {
        self.config.target_max_bitrate
    }

    /// Write the hint into the sender's first encoding
    ///
    /// `max_bitrate` is set to the target. `channels` is set to 2 only when
    /// the encoding already carries the field. Returns whether new
    /// parameters were accepted by the sender.
    pub async fn tune(&self, registry: &ConnectionRegistry, pc_id: PcId, sender: &dyn AudioSender) -> bool {
        if !self.config.bitrate_hint {
            return false;
        }
        if !sender.track().is_some_and(|t| t.is_audio()) {
            return false;
        }
        sender.set_music_hint();

        let mut parameters = match sender.get_parameters() {
            Ok(parameters) => parameters,
            Err(e) => {
                debug!("getParameters failed for {}: {}", pc_id, e);
                return false;
            }
        };

        let Some(encoding) = parameters.encodings.first_mut() else {
            capture_parameters(registry, pc_id, sender);
            capture_runtime(registry, pc_id, sender, "setParameters-no-encodings").await;
            return false;
        };

        let mut changed = false;
        if encoding.max_bitrate != Some(self.config.target_max_bitrate) {
            encoding.max_bitrate = Some(self.config.target_max_bitrate);
            changed = true;
        }
        if let Some(channels) = encoding.channels.as_mut() {
            if *channels != STEREO_CHANNELS {
                *channels = STEREO_CHANNELS;
                changed = true;
            }
        }

        if !changed {
            capture_parameters(registry, pc_id, sender);
            capture_runtime(registry, pc_id, sender, "setParameters-skip").await;
            return false;
        }

        match sender.set_parameters(parameters).await {
            Ok(()) => {
                capture_parameters(registry, pc_id, sender);
                capture_runtime(registry, pc_id, sender, "setParameters-applied").await;
                true
            }
            Err(e) => {
                warn!("sender.setParameters failed for {}: {}", pc_id, e);
                false
            }
        }
    }

    /// Snapshot and tune one newly attached sender
    pub async fn on_sender_added(
        &self,
        registry: &ConnectionRegistry,
        pc_id: PcId,
        sender: &dyn AudioSender,
        origin: &str,
    ) -> bool {
        if !sender.track().is_some_and(|t| t.is_audio()) {
            return false;
        }
        sender.set_music_hint();
        capture_parameters(registry, pc_id, sender);
        let tuned = self.tune(registry, pc_id, sender).await;
        capture_runtime(registry, pc_id, sender, origin).await;
        tuned
    }

    /// Snapshot and tune every audio sender of a connection
    ///
    /// Returns the number of audio senders visited.
    pub async fn refresh_audio_senders(&self, registry: &ConnectionRegistry, pc_id: PcId, reason: &str) -> usize {
        let Some(pc) = registry.connection(pc_id) else {
            return 0;
        };
        let senders: Vec<Arc<dyn AudioSender>> = match pc.senders() {
            Ok(senders) => senders,
            Err(e) => {
                warn!("refreshAudioSenders failed for {}: {}", pc_id, e);
                return 0;
            }
        };

        let mut visited = 0;
        let runtime_reason = format!("refresh:{}", reason);
        for sender in senders {
            if !sender.track().is_some_and(|t| t.is_audio()) {
                continue;
            }
            sender.set_music_hint();
            capture_parameters(registry, pc_id, sender.as_ref());
            self.tune(registry, pc_id, sender.as_ref()).await;
            capture_runtime(registry, pc_id, sender.as_ref(), &runtime_reason).await;
            visited += 1;
        }
        info!("Refreshed {} audio sender(s) for {} via {}", visited, pc_id, reason);
        visited
    }
}
