//! SDP media section splitting
//!
//! Splits an SDP blob into its session-level prefix and its media sections.
//! A media section starts at an `m=` line and runs up to the next `m=` line
//! or the end of the text. Each section knows which of its payload types are
//! mapped to Opus by its own `a=rtpmap` lines.
//!
//! The document borrows from the input and keeps every line, including the
//! empty piece produced by a trailing separator, so joining the lines back
//! together reproduces the input byte for byte.

use std::collections::BTreeSet;

use crate::parser;

/// Line separator used by an SDP blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\r\n`, as mandated by RFC 8866
    Crlf,
    /// Bare `\n`, tolerated on input
    Lf,
}

impl LineEnding {
    /// CRLF if it occurs anywhere in the text, otherwise LF
    pub fn detect(sdp: &str) -> Self {
        if sdp.contains("\r\n") {
            LineEnding::Crlf
        } else {
            LineEnding::Lf
        }
    }

    /// The separator itself
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Crlf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }
}

/// One `m=` section and its attribute lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection<'a> {
    lines: Vec<&'a str>,
    opus_payload_types: BTreeSet<&'a str>,
}

impl<'a> MediaSection<'a> {
    fn new(lines: Vec<&'a str>) -> Self {
        let opus_payload_types = lines
            .iter()
            .copied()
            .filter_map(|line| parser::rtpmap(line).ok())
            .filter(|map| map.is_opus())
            .map(|map| map.payload_type)
            .collect();
        Self {
            lines,
            opus_payload_types,
        }
    }

    /// The `m=` line that opens the section
    pub fn media_line(&self) -> &'a str {
        self.lines[0]
    }

    /// Media type from the `m=` line (`audio`, `video`, ...)
    pub fn media_kind(&self) -> &'a str {
        self.media_line()
            .trim_start_matches("m=")
            .split_whitespace()
            .next()
            .unwrap_or("")
    }

    /// All lines of the section, starting with the `m=` line
    pub fn lines(&self) -> &[&'a str] {
        &self.lines
    }

    /// Payload types mapped to Opus in this section
    pub fn opus_payload_types(&self) -> &BTreeSet<&'a str> {
        &self.opus_payload_types
    }

    /// Whether `payload_type` is declared as Opus in this section
    pub fn is_opus_payload(&self, payload_type: &str) -> bool {
        self.opus_payload_types.contains(payload_type)
    }
}

/// An SDP blob split into session prefix and media sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpDocument<'a> {
    line_ending: LineEnding,
    session: Vec<&'a str>,
    sections: Vec<MediaSection<'a>>,
}

impl<'a> SdpDocument<'a> {
    /// Split an SDP blob
    ///
    /// Never fails: text without `m=` lines is all session prefix.
    ///
    /// # Examples
    ///
    /// ```
    /// use cleanlink_sdp_core::section::SdpDocument;
    ///
    /// let sdp = "v=0\r\nm=audio 9 RTP/AVP 111\r\na=rtpmap:111 opus/48000/2\r\nm=video 9 RTP/AVP 96\r\n";
    /// let doc = SdpDocument::parse(sdp);
    /// assert_eq!(doc.session_lines(), &["v=0"]);
    /// assert_eq!(doc.sections().len(), 2);
    /// assert!(doc.sections()[0].is_opus_payload("111"));
    /// assert_eq!(doc.to_sdp(), sdp);
    /// ```
    pub fn parse(sdp: &'a str) -> Self {
        let line_ending = LineEnding::detect(sdp);
        let mut session = Vec::new();
        let mut sections = Vec::new();
        let mut current: Option<Vec<&'a str>> = None;

        for line in sdp.split(line_ending.as_str()) {
            if line.starts_with("m=") {
                if let Some(lines) = current.take() {
                    sections.push(MediaSection::new(lines));
                }
                current = Some(vec![line]);
            } else if let Some(lines) = current.as_mut() {
                lines.push(line);
            } else {
                session.push(line);
            }
        }
        if let Some(lines) = current {
            sections.push(MediaSection::new(lines));
        }

        Self {
            line_ending,
            session,
            sections,
        }
    }

    /// Separator detected on input
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Lines before the first `m=` line
    pub fn session_lines(&self) -> &[&'a str] {
        &self.session
    }

    /// Media sections in document order
    pub fn sections(&self) -> &[MediaSection<'a>] {
        &self.sections
    }

    /// Every line in document order
    pub fn lines(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.session
            .iter()
            .copied()
            .chain(self.sections.iter().flat_map(|s| s.lines.iter().copied()))
    }

    /// Join the lines back into SDP text
    pub fn to_sdp(&self) -> String {
        self.lines().collect::<Vec<_>>().join(self.line_ending.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_AUDIO: &str = "v=0\r\n\
o=- 1 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 0\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtpmap:0 PCMU/8000\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 96\r\n\
a=rtpmap:96 OPUS/48000/2\r\n";

    #[test]
    fn test_split_sections() {
        let doc = SdpDocument::parse(TWO_AUDIO);
        assert_eq!(doc.line_ending(), LineEnding::Crlf);
        assert_eq!(doc.session_lines().len(), 4);
        assert_eq!(doc.sections().len(), 2);

        let first = &doc.sections()[0];
        assert_eq!(first.media_kind(), "audio");
        assert_eq!(first.lines().len(), 3);
        assert_eq!(first.opus_payload_types().iter().copied().collect::<Vec<_>>(), vec!["111"]);
        assert!(!first.is_opus_payload("0"));
        assert!(!first.is_opus_payload("96"));

        let second = &doc.sections()[1];
        assert!(second.is_opus_payload("96"));
        assert!(!second.is_opus_payload("111"));
        // Trailing separator shows up as an empty last line
        assert_eq!(second.lines().last(), Some(&""));
    }

    #[test]
    fn test_round_trip_is_exact() {
        assert_eq!(SdpDocument::parse(TWO_AUDIO).to_sdp(), TWO_AUDIO);

        let no_trailing = TWO_AUDIO.trim_end_matches("\r\n");
        assert_eq!(SdpDocument::parse(no_trailing).to_sdp(), no_trailing);
    }

    #[test]
    fn test_lf_only_input() {
        let sdp = "v=0\nm=audio 9 RTP/AVP 111\na=rtpmap:111 opus/48000/2\n";
        let doc = SdpDocument::parse(sdp);
        assert_eq!(doc.line_ending(), LineEnding::Lf);
        assert!(doc.sections()[0].is_opus_payload("111"));
        assert_eq!(doc.to_sdp(), sdp);
    }

    #[test]
    fn test_no_media_sections() {
        let doc = SdpDocument::parse("v=0\r\ns=-\r\n");
        assert!(doc.sections().is_empty());
        assert_eq!(doc.to_sdp(), "v=0\r\ns=-\r\n");

        let doc = SdpDocument::parse("");
        assert!(doc.sections().is_empty());
        assert_eq!(doc.to_sdp(), "");
    }
}
