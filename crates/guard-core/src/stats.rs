//! Outbound RTP statistics
//!
//! A typed view of the handful of WebRTC stats entries the guard reads, and
//! the extraction of a [`SenderRuntimeSnapshot`] from a full report.
//!
//! Entries deserialize from the browser's JSON shape (`type` tag, camelCase
//! fields). Unknown entry types are kept as [`StatsEntry::Other`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stats entry for a locally sent RTP stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutboundRtpStats {
    pub id: String,
    pub kind: Option<String>,
    pub media_type: Option<String>,
    pub is_remote: bool,
    pub bytes_sent: Option<u64>,
    pub packets_sent: Option<u64>,
    pub retransmitted_packets_sent: Option<u64>,
    pub nack_count: Option<u64>,
    pub payload_type: Option<u32>,
    pub remote_id: Option<String>,
    pub codec_id: Option<String>,
    pub transport_id: Option<String>,
}

/// Receiver-side view of our stream, as reported back over RTCP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteInboundRtpStats {
    pub id: String,
    pub kind: Option<String>,
    pub media_type: Option<String>,
    pub local_id: Option<String>,
    pub packets_lost: Option<i64>,
    pub round_trip_time: Option<f64>,
    pub total_round_trip_time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodecStats {
    pub id: String,
    pub mime_type: Option<String>,
    pub clock_rate: Option<u32>,
    pub channels: Option<u32>,
    pub payload_type: Option<u32>,
    pub sdp_fmtp_line: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportStats {
    pub id: String,
    pub selected_candidate_pair_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CandidatePairStats {
    pub id: String,
    pub current_round_trip_time: Option<f64>,
    pub available_outgoing_bitrate: Option<f64>,
}

/// One entry of a stats report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StatsEntry {
    OutboundRtp(OutboundRtpStats),
    RemoteInboundRtp(RemoteInboundRtpStats),
    Codec(CodecStats),
    Transport(TransportStats),
    CandidatePair(CandidatePairStats),
    #[serde(other)]
    Other,
}

impl StatsEntry {
    /// Report-unique id, if the entry type carries one here
    pub fn id(&self) -> Option<&str> {
        match self {
            StatsEntry::OutboundRtp(s) => Some(&s.id),
            StatsEntry::RemoteInboundRtp(s) => Some(&s.id),
            StatsEntry::Codec(s) => Some(&s.id),
            StatsEntry::Transport(s) => Some(&s.id),
            StatsEntry::CandidatePair(s) => Some(&s.id),
            StatsEntry::Other => None,
        }
    }
}

fn is_audio(kind: &Option<String>, media_type: &Option<String>) -> bool {
    kind.as_deref() == Some("audio") || media_type.as_deref() == Some("audio")
}

impl OutboundRtpStats {
    /// Local (not remote-reported) audio stream
    pub fn is_local_audio(&self) -> bool {
        !self.is_remote && is_audio(&self.kind, &self.media_type)
    }
}

impl RemoteInboundRtpStats {
    pub fn is_audio(&self) -> bool {
        is_audio(&self.kind, &self.media_type)
    }
}

/// A stats report as returned by a sender
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsReport {
    entries: Vec<StatsEntry>,
}

impl StatsReport {
    pub fn new(entries: Vec<StatsEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[StatsEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by id
    pub fn get(&self, id: &str) -> Option<&StatsEntry> {
        self.entries.iter().find(|e| e.id() == Some(id))
    }

    /// The local audio outbound stream with the most bytes sent
    ///
    /// On equal byte counts the first entry wins.
    pub fn primary_outbound(&self) -> Option<&OutboundRtpStats> {
        let mut best: Option<&OutboundRtpStats> = None;
        for entry in &self.entries {
            let StatsEntry::OutboundRtp(outbound) = entry else {
                continue;
            };
            if !outbound.is_local_audio() {
                continue;
            }
            let replace = match best {
                None => true,
                Some(current) => outbound.bytes_sent.unwrap_or(0) > current.bytes_sent.unwrap_or(0),
            };
            if replace {
                best = Some(outbound);
            }
        }
        best
    }

    /// Remote-inbound entry describing `outbound`
    ///
    /// Linkage is tried via `outbound.remote_id`, then via a candidate whose
    /// `local_id` names the outbound. Without either, the audio candidate
    /// with the most packets lost is used (later entries win ties).
    pub fn remote_inbound_for(&self, outbound: &OutboundRtpStats) -> Option<&RemoteInboundRtpStats> {
        if let Some(StatsEntry::RemoteInboundRtp(linked)) =
            outbound.remote_id.as_deref().and_then(|id| self.get(id))
        {
            return Some(linked);
        }

        let candidates: Vec<&RemoteInboundRtpStats> = self
            .entries
            .iter()
            .filter_map(|e| match e {
                StatsEntry::RemoteInboundRtp(r) if r.is_audio() => Some(r),
                _ => None,
            })
            .collect();

        if let Some(by_local) = candidates
            .iter()
            .copied()
            .find(|r| r.local_id.as_deref() == Some(outbound.id.as_str()))
        {
            return Some(by_local);
        }

        candidates.into_iter().reduce(|best, entry| {
            if entry.packets_lost.unwrap_or(0) >= best.packets_lost.unwrap_or(0) {
                entry
            } else {
                best
            }
        })
    }

    fn codec(&self, id: Option<&str>) -> Option<&CodecStats> {
        match id.and_then(|id| self.get(id)) {
            Some(StatsEntry::Codec(codec)) => Some(codec),
            _ => None,
        }
    }

    fn transport(&self, id: Option<&str>) -> Option<&TransportStats> {
        match id.and_then(|id| self.get(id)) {
            Some(StatsEntry::Transport(transport)) => Some(transport),
            _ => None,
        }
    }

    fn candidate_pair(&self, id: Option<&str>) -> Option<&CandidatePairStats> {
        match id.and_then(|id| self.get(id)) {
            Some(StatsEntry::CandidatePair(pair)) => Some(pair),
            _ => None,
        }
    }
}

impl FromIterator<StatsEntry> for StatsReport {
    fn from_iter<I: IntoIterator<Item = StatsEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Negotiated codec as seen in the stats
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodecSnapshot {
    pub mime_type: Option<String>,
    pub clock_rate: Option<u32>,
    pub channels: Option<u32>,
    pub payload_type: Option<u32>,
    pub sdp_fmtp_line: Option<String>,
}

/// Transport the stream runs over
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransportSnapshot {
    pub transport_id: Option<String>,
    pub selected_candidate_pair_id: Option<String>,
    pub current_round_trip_time: Option<f64>,
    pub available_outgoing_bitrate: Option<f64>,
}

/// Runtime state of one audio sender at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SenderRuntimeSnapshot {
    /// What triggered the snapshot, e.g. `setParameters-applied`
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub retransmitted_packets_sent: Option<u64>,
    pub nack_count: Option<u64>,
    pub round_trip_time: Option<f64>,
    pub total_round_trip_time: Option<f64>,
    pub codec: CodecSnapshot,
    pub transport: TransportSnapshot,
}

impl SenderRuntimeSnapshot {
    /// Build a snapshot from a sender's stats report
    ///
    /// Returns `None` when the report holds no local audio outbound stream.
    pub fn from_report(report: &StatsReport, reason: impl Into<String>, timestamp: DateTime<Utc>) -> Option<Self> {
        let outbound = report.primary_outbound()?;
        let remote = report.remote_inbound_for(outbound);
        let codec = report.codec(outbound.codec_id.as_deref());
        let transport = report.transport(outbound.transport_id.as_deref());
        let pair = report.candidate_pair(transport.and_then(|t| t.selected_candidate_pair_id.as_deref()));

        Some(Self {
            reason: reason.into(),
            timestamp,
            bytes_sent: outbound.bytes_sent.unwrap_or(0),
            packets_sent: outbound.packets_sent.unwrap_or(0),
            retransmitted_packets_sent: outbound.retransmitted_packets_sent,
            nack_count: outbound.nack_count,
            round_trip_time: remote.and_then(|r| r.round_trip_time),
            total_round_trip_time: remote.and_then(|r| r.total_round_trip_time),
            codec: CodecSnapshot {
                mime_type: codec.and_then(|c| c.mime_type.clone()),
                clock_rate: codec.and_then(|c| c.clock_rate),
                channels: codec.and_then(|c| c.channels),
                payload_type: codec.and_then(|c| c.payload_type).or(outbound.payload_type),
                sdp_fmtp_line: codec.and_then(|c| c.sdp_fmtp_line.clone()),
            },
            transport: TransportSnapshot {
                transport_id: outbound.transport_id.clone(),
                selected_candidate_pair_id: transport.and_then(|t| t.selected_candidate_pair_id.clone()),
                current_round_trip_time: pair.and_then(|p| p.current_round_trip_time),
                available_outgoing_bitrate: pair.and_then(|p| p.available_outgoing_bitrate),
            },
        })
    }
}

/// One codec probe observation for a sender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodecSample {
    pub timestamp: DateTime<Utc>,
    pub pc_id: u64,
    pub track_id: Option<String>,
    pub track_label: Option<String>,
    pub codec_mime_type: Option<String>,
    pub codec_clock_rate: Option<u32>,
    pub codec_channels: Option<u32>,
    pub codec_payload_type: Option<u32>,
    pub round_trip_time: Option<f64>,
    pub bytes_sent: u64,
    pub packets_sent: u64,
}

impl CodecSample {
    pub fn from_snapshot(
        snapshot: &SenderRuntimeSnapshot,
        pc_id: u64,
        track_id: Option<String>,
        track_label: Option<String>,
    ) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            pc_id,
            track_id,
            track_label,
            codec_mime_type: snapshot.codec.mime_type.clone(),
            codec_clock_rate: snapshot.codec.clock_rate,
            codec_channels: snapshot.codec.channels,
            codec_payload_type: snapshot.codec.payload_type,
            round_trip_time: snapshot.round_trip_time,
            bytes_sent: snapshot.bytes_sent,
            packets_sent: snapshot.packets_sent,
        }
    }

    /// Whether the negotiated codec is Opus
    pub fn is_opus(&self) -> bool {
        self.codec_mime_type
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("audio/opus"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound(id: &str, bytes: u64) -> OutboundRtpStats {
        OutboundRtpStats {
            id: id.to_string(),
            kind: Some("audio".to_string()),
            bytes_sent: Some(bytes),
            packets_sent: Some(bytes / 100),
            ..Default::default()
        }
    }

    fn remote(id: &str, local_id: Option<&str>, lost: i64) -> RemoteInboundRtpStats {
        RemoteInboundRtpStats {
            id: id.to_string(),
            kind: Some("audio".to_string()),
            local_id: local_id.map(str::to_string),
            packets_lost: Some(lost),
            round_trip_time: Some(lost as f64 / 1000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_primary_outbound_picks_most_bytes() {
        let mut remote_reported = outbound("OT-remote", 10_000);
        remote_reported.is_remote = true;
        let mut video = outbound("OT-video", 50_000);
        video.kind = Some("video".to_string());

        let report: StatsReport = vec![
            StatsEntry::OutboundRtp(outbound("OT-a", 100)),
            StatsEntry::OutboundRtp(remote_reported),
            StatsEntry::OutboundRtp(video),
            StatsEntry::OutboundRtp(outbound("OT-b", 900)),
            StatsEntry::OutboundRtp(outbound("OT-c", 900)),
        ]
        .into_iter()
        .collect();

        assert_eq!(report.primary_outbound().map(|o| o.id.as_str()), Some("OT-b"));
    }

    #[test]
    fn test_media_type_counts_as_audio() {
        let mut legacy = outbound("OT-legacy", 1);
        legacy.kind = None;
        legacy.media_type = Some("audio".to_string());
        let report = StatsReport::new(vec![StatsEntry::OutboundRtp(legacy)]);
        assert!(report.primary_outbound().is_some());
    }

    #[test]
    fn test_remote_inbound_linkage_order() {
        let mut out = outbound("OT-1", 1000);
        out.remote_id = Some("RI-linked".to_string());

        let report = StatsReport::new(vec![
            StatsEntry::OutboundRtp(out.clone()),
            StatsEntry::RemoteInboundRtp(remote("RI-local", Some("OT-1"), 50)),
            StatsEntry::RemoteInboundRtp(remote("RI-linked", None, 1)),
        ]);
        assert_eq!(report.remote_inbound_for(&out).map(|r| r.id.as_str()), Some("RI-linked"));

        out.remote_id = None;
        assert_eq!(report.remote_inbound_for(&out).map(|r| r.id.as_str()), Some("RI-local"));
    }

    #[test]
    fn test_remote_inbound_fallback_prefers_later_on_tie() {
        let out = outbound("OT-1", 1000);
        let report = StatsReport::new(vec![
            StatsEntry::OutboundRtp(out.clone()),
            StatsEntry::RemoteInboundRtp(remote("RI-a", None, 3)),
            StatsEntry::RemoteInboundRtp(remote("RI-b", None, 7)),
            StatsEntry::RemoteInboundRtp(remote("RI-c", None, 7)),
            StatsEntry::RemoteInboundRtp(remote("RI-d", None, 2)),
        ]);
        assert_eq!(report.remote_inbound_for(&out).map(|r| r.id.as_str()), Some("RI-c"));
    }

    #[test]
    fn test_snapshot_follows_linkage() {
        let mut out = outbound("OT-1", 64_000);
        out.codec_id = Some("CO-111".to_string());
        out.transport_id = Some("T-01".to_string());
        out.nack_count = Some(4);
        out.payload_type = Some(111);

        let report = StatsReport::new(vec![
            StatsEntry::OutboundRtp(out),
            StatsEntry::Codec(CodecStats {
                id: "CO-111".to_string(),
                mime_type: Some("audio/opus".to_string()),
                clock_rate: Some(48000),
                channels: Some(2),
                payload_type: None,
                sdp_fmtp_line: Some("minptime=10;stereo=1".to_string()),
            }),
            StatsEntry::Transport(TransportStats {
                id: "T-01".to_string(),
                selected_candidate_pair_id: Some("CP-1".to_string()),
            }),
            StatsEntry::CandidatePair(CandidatePairStats {
                id: "CP-1".to_string(),
                current_round_trip_time: Some(0.021),
                available_outgoing_bitrate: Some(1_500_000.0),
            }),
            StatsEntry::RemoteInboundRtp(remote("RI-1", Some("OT-1"), 12)),
            StatsEntry::Other,
        ]);

        let snapshot = SenderRuntimeSnapshot::from_report(&report, "codec-probe", Utc::now()).unwrap();
        assert_eq!(snapshot.reason, "codec-probe");
        assert_eq!(snapshot.bytes_sent, 64_000);
        assert_eq!(snapshot.packets_sent, 640);
        assert_eq!(snapshot.nack_count, Some(4));
        assert_eq!(snapshot.round_trip_time, Some(0.012));
        assert_eq!(snapshot.codec.mime_type.as_deref(), Some("audio/opus"));
        // falls back to the outbound payload type
        assert_eq!(snapshot.codec.payload_type, Some(111));
        assert_eq!(snapshot.transport.selected_candidate_pair_id.as_deref(), Some("CP-1"));
        assert_eq!(snapshot.transport.current_round_trip_time, Some(0.021));

        let sample = CodecSample::from_snapshot(&snapshot, 1, Some("trk".to_string()), None);
        assert!(sample.is_opus());
        assert_eq!(sample.codec_channels, Some(2));
    }

    #[test]
    fn test_no_outbound_no_snapshot() {
        let report = StatsReport::new(vec![StatsEntry::RemoteInboundRtp(remote("RI", None, 0))]);
        assert!(SenderRuntimeSnapshot::from_report(&report, "runtime", Utc::now()).is_none());
        assert!(SenderRuntimeSnapshot::from_report(&StatsReport::default(), "runtime", Utc::now()).is_none());
    }

    #[test]
    fn test_deserialize_browser_shape() {
        let json = r#"[
            {"type":"outbound-rtp","id":"OT01A","kind":"audio","bytesSent":5120,"packetsSent":40,"codecId":"CIT01_111","transportId":"T01"},
            {"type":"codec","id":"CIT01_111","mimeType":"audio/opus","clockRate":48000,"channels":2,"payloadType":111},
            {"type":"media-source","id":"SA1","trackIdentifier":"abc"},
            {"type":"transport","id":"T01","selectedCandidatePairId":"CPa"}
        ]"#;
        let report: StatsReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.entries().len(), 4);
        assert_eq!(report.entries()[2], StatsEntry::Other);

        let snapshot = SenderRuntimeSnapshot::from_report(&report, "runtime", Utc::now()).unwrap();
        assert_eq!(snapshot.bytes_sent, 5120);
        assert_eq!(snapshot.codec.payload_type, Some(111));
        assert_eq!(snapshot.transport.selected_candidate_pair_id.as_deref(), Some("CPa"));
        assert_eq!(snapshot.transport.current_round_trip_time, None);
    }
}
