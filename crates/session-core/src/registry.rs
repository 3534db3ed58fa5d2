//! Connection and sender registry
//!
//! Tracks the peer connections of a session and gives their audio senders
//! stable handles. Browser objects are identified by integer connection ids
//! and `pc<id>-sender<n>` sender keys instead of object identity, so
//! snapshots can be stored and reported without holding on to the objects.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cleanlink_guard_core::SenderRuntimeSnapshot;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapter::{
    AudioSender, ConnectionState, IceConnectionState, PeerConnection, SendEncoding, SendParameters,
    SignalingState, TrackInfo,
};

/// Session-unique peer connection id, assigned from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PcId(pub u64);

impl fmt::Display for PcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pc#{}", self.0)
    }
}

/// Session-unique audio sender key, `pc<id>-sender<n>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SenderKey(String);

impl SenderKey {
    fn new(pc_id: PcId, sender_number: u64) -> Self {
        Self(format!("pc{}-sender{}", pc_id.0, sender_number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An audio sender of a registered, non-closed connection
#[derive(Clone)]
pub struct ActiveSender {
    pub pc_id: PcId,
    pub key: SenderKey,
    pub sender: Arc<dyn AudioSender>,
    pub track: TrackInfo,
}

impl fmt::Debug for ActiveSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSender")
            .field("pc_id", &self.pc_id)
            .field("key", &self.key)
            .field("track", &self.track)
            .finish()
    }
}

/// Sender parameters as last read from the sender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SenderParameterSnapshot {
    pub track_id: Option<String>,
    pub track_label: Option<String>,
    pub encodings: Vec<SendEncoding>,
    pub degradation_preference: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SenderParameterSnapshot {
    pub fn new(track: Option<&TrackInfo>, parameters: &SendParameters) -> Self {
        Self {
            track_id: track.map(|t| t.id.clone()),
            track_label: track.map(|t| t.label.clone()),
            encodings: parameters.encodings.clone(),
            degradation_preference: parameters.degradation_preference.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-connection line of a status report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSummary {
    pub pc_id: PcId,
    pub connection_state: ConnectionState,
    pub ice_connection_state: IceConnectionState,
    pub signaling_state: SignalingState,
    pub audio_sender_count: usize,
}

#[derive(Default)]
struct RegistryInner {
    next_pc_id: u64,
    next_sender_number: u64,
    connections: BTreeMap<PcId, Arc<dyn PeerConnection>>,
    sender_keys: HashMap<(PcId, String), SenderKey>,
    parameter_snapshots: HashMap<SenderKey, SenderParameterSnapshot>,
    runtime_snapshots: HashMap<SenderKey, SenderRuntimeSnapshot>,
    patched: HashSet<SenderKey>,
}

/// Registry of the connections and senders of one session
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_pc_id: 1,
                next_sender_number: 1,
                ..Default::default()
            }),
        }
    }

    /// Register a new peer connection
    pub fn register(&self, pc: Arc<dyn PeerConnection>) -> PcId {
        let mut inner = self.inner.lock();
        let pc_id = PcId(inner.next_pc_id);
        inner.next_pc_id += 1;
        inner.connections.insert(pc_id, pc);
        debug!("Registered peer connection {}", pc_id);
        pc_id
    }

    /// Drop a connection; its sender keys and snapshots are kept for reporting
    pub fn unregister(&self, pc_id: PcId) -> bool {
        let removed = self.inner.lock().connections.remove(&pc_id).is_some();
        if removed {
            debug!("Unregistered peer connection {}", pc_id);
        }
        removed
    }

    /// Apply a connection state change
    ///
    /// Closed and failed connections are unregistered. Returns whether the
    /// connection is still registered afterwards.
    pub fn on_connection_state(&self, pc_id: PcId, state: ConnectionState) -> bool {
        info!("{}.connectionState={:?}", pc_id, state);
        if state.is_terminal() {
            self.unregister(pc_id);
            return false;
        }
        self.contains(pc_id)
    }

    pub fn contains(&self, pc_id: PcId) -> bool {
        self.inner.lock().connections.contains_key(&pc_id)
    }

    pub fn connection(&self, pc_id: PcId) -> Option<Arc<dyn PeerConnection>> {
        self.inner.lock().connections.get(&pc_id).cloned()
    }

    /// Registered connection ids in registration order
    pub fn connection_ids(&self) -> Vec<PcId> {
        self.inner.lock().connections.keys().copied().collect()
    }

    fn connections(&self) -> Vec<(PcId, Arc<dyn PeerConnection>)> {
        self.inner
            .lock()
            .connections
            .iter()
            .map(|(id, pc)| (*id, Arc::clone(pc)))
            .collect()
    }

    /// Stable key for a sender of connection `pc_id`
    pub fn sender_key(&self, pc_id: PcId, sender: &dyn AudioSender) -> SenderKey {
        let mut inner = self.inner.lock();
        let handle = (pc_id, sender.sender_id());
        if let Some(key) = inner.sender_keys.get(&handle) {
            return key.clone();
        }
        let key = SenderKey::new(pc_id, inner.next_sender_number);
        inner.next_sender_number += 1;
        inner.sender_keys.insert(handle, key.clone());
        key
    }

    /// Audio senders with a track, over every registered non-closed connection
    ///
    /// Re-enumerated on every call. A connection whose sender list cannot be
    /// read is skipped.
    pub fn active_audio_senders(&self) -> Vec<ActiveSender> {
        let mut active = Vec::new();
        for (pc_id, pc) in self.connections() {
            if pc.connection_state() == ConnectionState::Closed {
                continue;
            }
            let senders = match pc.senders() {
                Ok(senders) => senders,
                Err(e) => {
                    warn!("Failed to enumerate senders of {}: {}", pc_id, e);
                    continue;
                }
            };
            for sender in senders {
                let Some(track) = sender.track().filter(TrackInfo::is_audio) else {
                    continue;
                };
                let key = self.sender_key(pc_id, sender.as_ref());
                active.push(ActiveSender {
                    pc_id,
                    key,
                    sender,
                    track,
                });
            }
        }
        active
    }

    /// One summary line per registered non-closed connection
    pub fn summary(&self) -> Vec<ConnectionSummary> {
        self.connections()
            .into_iter()
            .filter(|(_, pc)| pc.connection_state() != ConnectionState::Closed)
            .map(|(pc_id, pc)| {
                let audio_sender_count = pc
                    .senders()
                    .map(|senders| {
                        senders
                            .iter()
                            .filter(|s| s.track().is_some_and(|t| t.is_audio()))
                            .count()
                    })
                    .unwrap_or(0);
                ConnectionSummary {
                    pc_id,
                    connection_state: pc.connection_state(),
                    ice_connection_state: pc.ice_connection_state(),
                    signaling_state: pc.signaling_state(),
                    audio_sender_count,
                }
            })
            .collect()
    }

    pub fn record_parameters(&self, key: &SenderKey, snapshot: SenderParameterSnapshot) {
        self.inner.lock().parameter_snapshots.insert(key.clone(), snapshot);
    }

    pub fn parameters(&self, key: &SenderKey) -> Option<SenderParameterSnapshot> {
        self.inner.lock().parameter_snapshots.get(key).cloned()
    }

    pub fn record_runtime(&self, key: &SenderKey, snapshot: SenderRuntimeSnapshot) {
        debug!("Runtime snapshot for {} ({})", key, snapshot.reason);
        self.inner.lock().runtime_snapshots.insert(key.clone(), snapshot);
    }

    pub fn runtime(&self, key: &SenderKey) -> Option<SenderRuntimeSnapshot> {
        self.inner.lock().runtime_snapshots.get(key).cloned()
    }

    /// Mark a sender as carrying a retrofitted gain stage
    pub fn mark_patched(&self, key: &SenderKey) {
        self.inner.lock().patched.insert(key.clone());
    }

    pub fn is_patched(&self, key: &SenderKey) -> bool {
        self.inner.lock().patched.contains(key)
    }

    /// Forget a patch, e.g. once the processed track ended
    pub fn clear_patched(&self, key: &SenderKey) -> bool {
        self.inner.lock().patched.remove(key)
    }

    pub fn patched_count(&self) -> usize {
        self.inner.lock().patched.len()
    }
}
