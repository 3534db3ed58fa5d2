//! Opus fmtp rewriter
//!
//! Applies an [`OpusPolicy`] to every Opus `a=fmtp` line of an SDP blob.
//!
//! For each media section the Opus payload types are collected from that
//! section's own `a=rtpmap` lines. An `a=fmtp` line is rewritten only when its
//! payload type belongs to that set; every other line, including fmtp lines
//! of other codecs and fmtp lines whose payload type is only Opus in a
//! different section, is passed through untouched. No lines are added or
//! removed and the trailing separator of the input is reproduced.
//!
//! Rewriting is idempotent: feeding the output back in changes nothing.

use tracing::debug;

use crate::fmtp::{FmtpLine, ParamMap};
use crate::policy::{merge, OpusPolicy};
use crate::section::{MediaSection, SdpDocument};

/// Result of one rewrite pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// The rewritten SDP text
    pub sdp: String,
    /// Number of fmtp lines whose text changed
    pub changed_count: usize,
    /// The last fmtp line written, if any changed
    pub last_changed_line: Option<String>,
}

impl RewriteOutcome {
    /// Whether any line was rewritten
    pub fn is_changed(&self) -> bool {
        self.changed_count > 0
    }
}

/// Rewrite the Opus fmtp lines of `sdp` to satisfy `policy`
///
/// `context` names the negotiation step that asked for the rewrite and is
/// only used for diagnostics.
///
/// # Examples
///
/// ```
/// use cleanlink_sdp_core::policy::OpusPolicy;
/// use cleanlink_sdp_core::rewriter::rewrite;
///
/// let sdp = "v=0\r\nm=audio 9 RTP/AVP 111\r\na=rtpmap:111 opus/48000/2\r\na=fmtp:111 minptime=10;cbr=1\r\n";
/// let policy = OpusPolicy::from_pairs([("stereo", "1"), ("usedtx", "0")]).unwrap();
///
/// let outcome = rewrite(sdp, &policy, "createOffer");
/// assert_eq!(outcome.changed_count, 1);
/// assert_eq!(outcome.last_changed_line.as_deref(), Some("a=fmtp:111 minptime=10;stereo=1;usedtx=0"));
/// assert!(outcome.sdp.ends_with("a=fmtp:111 minptime=10;stereo=1;usedtx=0\r\n"));
///
/// // A second pass has nothing left to do
/// assert_eq!(rewrite(&outcome.sdp, &policy, "createOffer").changed_count, 0);
/// ```
pub fn rewrite(sdp: &str, policy: &OpusPolicy, context: &str) -> RewriteOutcome {
    let document = SdpDocument::parse(sdp);

    let mut lines: Vec<String> = document.session_lines().iter().map(|l| l.to_string()).collect();
    let mut changed_count = 0;
    let mut last_changed_line = None;

    for section in document.sections() {
        for line in section.lines() {
            match rewrite_line(section, line, policy) {
                Some(rewritten) => {
                    debug!(
                        "[{}] rewrote Opus fmtp in m={} section: {} -> {}",
                        context,
                        section.media_kind(),
                        line,
                        rewritten
                    );
                    changed_count += 1;
                    last_changed_line = Some(rewritten.clone());
                    lines.push(rewritten);
                }
                None => lines.push(line.to_string()),
            }
        }
    }

    if changed_count == 0 {
        return RewriteOutcome {
            sdp: sdp.to_string(),
            changed_count,
            last_changed_line,
        };
    }

    RewriteOutcome {
        sdp: lines.join(document.line_ending().as_str()),
        changed_count,
        last_changed_line,
    }
}

/// New text for `line` if it is an Opus fmtp line of `section` that the
/// policy changes
fn rewrite_line(section: &MediaSection<'_>, line: &str, policy: &OpusPolicy) -> Option<String> {
    let fmtp = FmtpLine::parse(line).ok()?;
    if !section.is_opus_payload(&fmtp.payload_type) {
        return None;
    }

    let merged: ParamMap = merge(&fmtp.params, policy);
    let rewritten = FmtpLine {
        payload_type: fmtp.payload_type,
        params: merged,
    }
    .to_string();

    (rewritten != line).then_some(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(fmtp: &str) -> String {
        format!(
            "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 63 0\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtcp-fb:111 transport-cc\r\n\
{}\r\n\
a=rtpmap:63 red/48000/2\r\n\
a=fmtp:63 111/111\r\n\
a=rtpmap:0 PCMU/8000\r\n",
            fmtp
        )
    }

    #[test]
    fn test_rewrites_opus_fmtp() {
        let sdp = offer("a=fmtp:111 minptime=10;useinbandfec=1");
        let outcome = rewrite(&sdp, &OpusPolicy::music(), "createOffer");

        assert_eq!(outcome.changed_count, 1);
        let expected = "a=fmtp:111 minptime=10;useinbandfec=1;maxplaybackrate=48000;\
sprop-maxcapturerate=48000;maxaveragebitrate=128000;stereo=1;sprop-stereo=1;usedtx=0";
        assert_eq!(outcome.last_changed_line.as_deref(), Some(expected));
        assert!(outcome.sdp.contains(&format!("{}\r\n", expected)));
        // RED parameters belong to another codec and are untouched
        assert!(outcome.sdp.contains("a=fmtp:63 111/111\r\n"));
        assert_eq!(outcome.sdp.lines().count(), sdp.lines().count());
    }

    #[test]
    fn test_unchanged_line_is_not_counted() {
        let policy = OpusPolicy::from_pairs([("stereo", "1")]).unwrap();
        let sdp = offer("a=fmtp:111 minptime=10;stereo=1");
        let outcome = rewrite(&sdp, &policy, "createAnswer");
        assert_eq!(outcome.changed_count, 0);
        assert_eq!(outcome.last_changed_line, None);
        assert_eq!(outcome.sdp, sdp);
    }

    #[test]
    fn test_whitespace_normalization_counts_as_change() {
        let policy = OpusPolicy::from_pairs([("stereo", "1")]).unwrap();
        let sdp = offer("a=fmtp:111 minptime=10; stereo=1");
        let outcome = rewrite(&sdp, &policy, "createAnswer");
        assert_eq!(outcome.changed_count, 1);
        assert_eq!(outcome.last_changed_line.as_deref(), Some("a=fmtp:111 minptime=10;stereo=1"));
    }

    #[test]
    fn test_empty_opus_parameters_receive_policy() {
        let policy = OpusPolicy::from_pairs([("stereo", "1"), ("usedtx", "0")]).unwrap();
        let outcome = rewrite(&offer("a=fmtp:111  "), &policy, "createOffer");
        assert_eq!(outcome.changed_count, 1);
        assert_eq!(outcome.last_changed_line.as_deref(), Some("a=fmtp:111 stereo=1;usedtx=0"));
        assert!(outcome.sdp.contains("a=fmtp:111 stereo=1;usedtx=0\r\n"));
    }

    #[test]
    fn test_malformed_input_is_returned_unchanged() {
        for sdp in ["", "garbage", "v=0\r\ns=-\r\n", "a=fmtp:111 stereo=0\r\n"] {
            let outcome = rewrite(sdp, &OpusPolicy::music(), "setRemoteDescription");
            assert_eq!(outcome.sdp, sdp);
            assert!(!outcome.is_changed());
        }
    }

    #[test]
    fn test_fmtp_without_rtpmap_is_untouched() {
        let sdp = "v=0\r\nm=audio 9 RTP/AVP 111\r\na=fmtp:111 stereo=0\r\n";
        let outcome = rewrite(sdp, &OpusPolicy::music(), "createOffer");
        assert_eq!(outcome.changed_count, 0);
        assert_eq!(outcome.sdp, sdp);
    }

    #[test]
    fn test_last_changed_line_is_last_in_document_order() {
        let sdp = "v=0\r\n\
m=audio 9 RTP/AVP 111\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10\r\n\
m=audio 9 RTP/AVP 96\r\n\
a=rtpmap:96 opus/48000/2\r\n\
a=fmtp:96 minptime=20\r\n";
        let policy = OpusPolicy::from_pairs([("stereo", "1")]).unwrap();
        let outcome = rewrite(sdp, &policy, "createOffer");
        assert_eq!(outcome.changed_count, 2);
        assert_eq!(outcome.last_changed_line.as_deref(), Some("a=fmtp:96 minptime=20;stereo=1"));
    }
}
