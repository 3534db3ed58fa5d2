//! Behavioural tests for the Opus fmtp rewriter
//!
//! Covers the properties the rewriter guarantees to callers:
//! - parameter string round-trip
//! - idempotence
//! - isolation of non-Opus payload types
//! - per-section payload type sets
//! - line separator preservation

use cleanlink_sdp_core::{rewrite, OpusPolicy, ParamMap, SdpDocument};
use proptest::prelude::*;

const CHROME_OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
a=msid-semantic: WMS\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 63 9 0 8 13 110 126\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=sendrecv\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtcp-fb:111 transport-cc\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtpmap:63 red/48000/2\r\n\
a=fmtp:63 111/111\r\n\
a=rtpmap:9 G722/8000\r\n\
a=rtpmap:0 PCMU/8000\r\n\
a=rtpmap:8 PCMA/8000\r\n\
a=rtpmap:13 CN/8000\r\n\
a=rtpmap:110 telephone-event/48000\r\n\
a=rtpmap:126 telephone-event/8000\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:1\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtpmap:97 rtx/90000\r\n\
a=fmtp:97 apt=96\r\n";

#[test]
fn test_chrome_offer_gets_music_policy() {
    let outcome = rewrite(CHROME_OFFER, &OpusPolicy::music(), "createOffer");

    assert_eq!(outcome.changed_count, 1);
    let line = outcome.last_changed_line.expect("opus line rewritten");
    let params = ParamMap::parse(&line);
    for (key, value) in OpusPolicy::music().iter() {
        assert_eq!(params.get(key), Some(value), "policy key {}", key);
    }
    assert_eq!(params.get("minptime"), Some("10"));

    // Video rtx fmtp shares nothing with Opus
    assert!(outcome.sdp.contains("a=fmtp:97 apt=96\r\n"));
    assert!(outcome.sdp.contains("a=fmtp:63 111/111\r\n"));
    assert_eq!(outcome.sdp.split("\r\n").count(), CHROME_OFFER.split("\r\n").count());
}

#[test]
fn test_rewrite_is_idempotent() {
    let policy = OpusPolicy::music();
    let first = rewrite(CHROME_OFFER, &policy, "createOffer");
    let second = rewrite(&first.sdp, &policy, "createOffer");

    assert_eq!(second.changed_count, 0);
    assert_eq!(second.last_changed_line, None);
    assert_eq!(second.sdp, first.sdp);
}

#[test]
fn test_non_opus_payload_is_isolated() {
    // PT 111 is PCMU-mapped here, so its fmtp must not be touched
    let sdp = "v=0\r\n\
m=audio 9 RTP/AVP 111\r\n\
a=rtpmap:111 PCMU/8000\r\n\
a=fmtp:111 cbr=1;usedtx=1\r\n";
    let outcome = rewrite(sdp, &OpusPolicy::music(), "setRemoteDescription");
    assert_eq!(outcome.changed_count, 0);
    assert_eq!(outcome.sdp, sdp);
}

#[test]
fn test_multi_section_independence() {
    let sdp = "v=0\r\n\
s=-\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 96\r\n\
a=mid:0\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10\r\n\
a=fmtp:96 minptime=10\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 96 111\r\n\
a=mid:1\r\n\
a=rtpmap:96 opus/48000/2\r\n\
a=fmtp:96 minptime=20\r\n\
a=fmtp:111 minptime=20\r\n";

    let policy = OpusPolicy::from_pairs([("stereo", "1")]).unwrap();
    let outcome = rewrite(sdp, &policy, "createOffer");
    assert_eq!(outcome.changed_count, 2);

    let lines: Vec<&str> = outcome.sdp.split("\r\n").collect();
    assert_eq!(lines[5], "a=fmtp:111 minptime=10;stereo=1");
    // 96 has no opus rtpmap in the first section
    assert_eq!(lines[6], "a=fmtp:96 minptime=10");
    assert_eq!(lines[10], "a=fmtp:96 minptime=20;stereo=1");
    // 111 has no opus rtpmap in the second section
    assert_eq!(lines[11], "a=fmtp:111 minptime=20");
}

#[test]
fn test_crlf_preservation() {
    let policy = OpusPolicy::music();

    let with_trailing = rewrite(CHROME_OFFER, &policy, "createOffer");
    assert!(with_trailing.sdp.ends_with("\r\n"));

    let trimmed = CHROME_OFFER.trim_end_matches("\r\n");
    let without_trailing = rewrite(trimmed, &policy, "createOffer");
    assert!(!without_trailing.sdp.ends_with("\r\n"));
    assert!(without_trailing.sdp.ends_with("a=fmtp:97 apt=96"));
    assert_eq!(without_trailing.changed_count, 1);
}

#[test]
fn test_session_prefix_is_untouched() {
    let outcome = rewrite(CHROME_OFFER, &OpusPolicy::music(), "createOffer");
    let before = SdpDocument::parse(CHROME_OFFER);
    let after = SdpDocument::parse(&outcome.sdp);
    assert_eq!(before.session_lines(), after.session_lines());
    assert_eq!(before.sections().len(), after.sections().len());
}

fn param_entry() -> impl Strategy<Value = String> {
    (
        "[a-z][a-z0-9-]{0,12}",
        prop::option::of("[A-Za-z0-9=/.-]{0,10}"),
        " {0,2}",
    )
        .prop_map(|(key, value, pad)| match value {
            Some(value) => format!("{pad}{key}={value}{pad}"),
            None => format!("{pad}{key}"),
        })
}

fn param_string() -> impl Strategy<Value = String> {
    prop::collection::vec(param_entry(), 0..8).prop_map(|entries| entries.join(";"))
}

proptest! {
    #[test]
    fn prop_param_map_round_trip(raw in param_string()) {
        let map = ParamMap::parse_params(&raw);
        prop_assert_eq!(ParamMap::parse_params(&map.serialize()), map);
    }

    #[test]
    fn prop_rewrite_is_idempotent(
        opus_params in param_string(),
        other_params in param_string(),
        trailing in any::<bool>(),
    ) {
        let mut sdp = format!(
            "v=0\r\nm=audio 9 RTP/AVP 111 9\r\na=rtpmap:111 opus/48000/2\r\na=fmtp:111 x{}\r\na=rtpmap:9 G722/8000\r\na=fmtp:9 x{}",
            opus_params, other_params
        );
        if trailing {
            sdp.push_str("\r\n");
        }

        let policy = OpusPolicy::music();
        let once = rewrite(&sdp, &policy, "prop");
        let twice = rewrite(&once.sdp, &policy, "prop");

        prop_assert_eq!(twice.changed_count, 0);
        prop_assert_eq!(&twice.sdp, &once.sdp);
        prop_assert_eq!(once.sdp.ends_with("\r\n"), trailing);
        let g722_line = format!("a=fmtp:9 x{}", other_params);
        prop_assert!(once.sdp.contains(&g722_line));
    }
}
