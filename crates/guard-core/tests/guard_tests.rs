//! End-to-end checks of rewrite + guard evaluation

use cleanlink_guard_core::{evaluate_opus_guard, evaluate_stereo_gate, GateOutcome, GuardState, StereoProbeResult};
use cleanlink_sdp_core::{rewrite, OpusPolicy};

const FIREFOX_ANSWER: &str = "v=0\r\n\
o=mozilla...THIS_IS_SDPARTA-99.0 1 0 IN IP4 0.0.0.0\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 109 9 0 8 101\r\n\
c=IN IP4 0.0.0.0\r\n\
a=sendrecv\r\n\
a=fmtp:109 maxplaybackrate=48000;stereo=0;useinbandfec=1;cbr=1\r\n\
a=fmtp:101 0-15\r\n\
a=rtpmap:109 OPUS/48000/2\r\n\
a=rtpmap:9 G722/8000/1\r\n\
a=rtpmap:101 telephone-event/8000\r\n";

#[test]
fn test_guard_fails_before_any_rewrite() {
    let state = GuardState::new();
    let report = state.evaluate(&OpusPolicy::music());
    assert!(!report.pass);
    assert!(report.reason.is_some());
}

#[test]
fn test_rewritten_answer_passes_guard() {
    let policy = OpusPolicy::music();
    let mut state = GuardState::new();

    // rtpmap after fmtp and an upper-case codec name still link PT 109
    let outcome = rewrite(FIREFOX_ANSWER, &policy, "createAnswer");
    assert_eq!(outcome.changed_count, 1);
    assert!(state.record(&outcome, "createAnswer"));

    let report = state.evaluate(&policy);
    assert!(report.pass, "{:?}", report.reason);
    assert!(!report.parsed.contains_key("cbr"));
    assert_eq!(report.parsed.get("stereo"), Some("1"));
    assert!(outcome.sdp.contains("a=fmtp:101 0-15\r\n"));

    // Applying the answer again changes nothing and keeps the state
    let again = rewrite(&outcome.sdp, &policy, "setLocalDescription");
    assert!(!state.record(&again, "setLocalDescription"));
    assert_eq!(state.applied_count(), 1);
    assert_eq!(state.last_context(), Some("createAnswer"));
}

#[test]
fn test_stricter_policy_flags_old_line() {
    let music = OpusPolicy::music();
    let outcome = rewrite(FIREFOX_ANSWER, &music, "createAnswer");

    let stricter = OpusPolicy::music_with_bitrate(256_000);
    let report = evaluate_opus_guard(outcome.last_changed_line.as_deref(), &stricter);
    assert!(!report.pass);
    assert_eq!(
        report.reason.as_deref(),
        Some("Opus fmtp missing expected maxaveragebitrate=256000.")
    );
}

#[test]
fn test_stereo_classification_table() {
    let cases = [
        (Some(1), None, GateOutcome::FailMonoTrack),
        (Some(2), Some(0.005), GateOutcome::FailDualMono),
        (Some(2), Some(0.5), GateOutcome::Pass),
        (None, None, GateOutcome::Pass),
    ];
    for (channels, diff, expected) in cases {
        let probe = StereoProbeResult::new(channels, diff);
        assert_eq!(evaluate_stereo_gate(Some(&probe), 0.02).outcome, expected, "{:?}/{:?}", channels, diff);
    }
}
