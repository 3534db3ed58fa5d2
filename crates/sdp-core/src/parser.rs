//! SDP attribute line grammars
//!
//! Low-level `nom` parsers for the two attribute lines the rewriter cares
//! about:
//!
//! - `a=rtpmap:<payload type> <encoding name>/<clock rate>[/<channels>]`
//! - `a=fmtp:<payload type> <format specific parameters>`
//!
//! Both operate on a single line with the line terminator already removed.

use nom::{
    bytes::complete::{tag, tag_no_case, take_till1, take_while1},
    character::complete::{char, digit1},
    combinator::opt,
    error::{Error, ErrorKind},
    sequence::preceded,
    IResult,
};

use crate::error::{Result, SdpError};

/// Parsed `a=rtpmap` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpMap<'a> {
    /// Payload type, kept as the decimal text found in the SDP
    pub payload_type: &'a str,
    /// Encoding name as written (e.g. `opus`, `OPUS`, `PCMU`)
    pub encoding_name: &'a str,
    /// RTP clock rate
    pub clock_rate: &'a str,
    /// Optional encoding parameters (channel count for audio)
    pub encoding_params: Option<&'a str>,
}

impl RtpMap<'_> {
    /// Whether this mapping declares the Opus codec (case-insensitive)
    pub fn is_opus(&self) -> bool {
        self.encoding_name.eq_ignore_ascii_case("opus")
    }
}

fn whitespace1(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_whitespace())(input)
}

/// Parse an `a=rtpmap` line
///
/// The attribute name is matched case-insensitively. Anything after the
/// clock rate and optional encoding parameters is ignored.
///
/// # Examples
///
/// ```
/// use cleanlink_sdp_core::parser::parse_rtpmap_line;
///
/// let (_, map) = parse_rtpmap_line("a=rtpmap:111 opus/48000/2").unwrap();
/// assert_eq!(map.payload_type, "111");
/// assert_eq!(map.clock_rate, "48000");
/// assert_eq!(map.encoding_params, Some("2"));
/// assert!(map.is_opus());
/// ```
pub fn parse_rtpmap_line(input: &str) -> IResult<&str, RtpMap<'_>> {
    let (input, _) = tag_no_case("a=rtpmap:")(input)?;
    let (input, payload_type) = digit1(input)?;
    let (input, _) = whitespace1(input)?;
    let (input, encoding_name) = take_till1(|c: char| c == '/' || c.is_whitespace())(input)?;
    let (input, _) = char('/')(input)?;
    let (input, clock_rate) = digit1(input)?;
    let (input, encoding_params) = opt(preceded(char('/'), digit1))(input)?;

    Ok((
        input,
        RtpMap {
            payload_type,
            encoding_name,
            clock_rate,
            encoding_params,
        },
    ))
}

/// Parse an `a=fmtp` line into `(payload type, parameter string)`
///
/// The parameter string is everything after the whitespace following the
/// payload type. A whitespace-only tail of two or more characters yields its
/// last character as the parameter string, which parses to no parameters.
///
/// # Examples
///
/// ```
/// use cleanlink_sdp_core::parser::parse_fmtp_line;
///
/// let (_, (pt, params)) = parse_fmtp_line("a=fmtp:111 minptime=10;useinbandfec=1").unwrap();
/// assert_eq!(pt, "111");
/// assert_eq!(params, "minptime=10;useinbandfec=1");
///
/// assert!(parse_fmtp_line("a=fmtp:111").is_err());
/// assert!(parse_fmtp_line("a=fmtp:111 ").is_err());
/// ```
pub fn parse_fmtp_line(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = tag("a=fmtp:")(input)?;
    let (input, payload_type) = digit1(input)?;
    let (params, separator) = whitespace1(input)?;

    if !params.is_empty() {
        return Ok(("", (payload_type, params)));
    }

    match separator.char_indices().last() {
        Some((last, _)) if last > 0 => Ok(("", (payload_type, &separator[last..]))),
        _ => Err(nom::Err::Error(Error::new(params, ErrorKind::Eof))),
    }
}

/// Strict wrapper around [`parse_rtpmap_line`] returning a crate error
pub fn rtpmap(line: &str) -> Result<RtpMap<'_>> {
    parse_rtpmap_line(line)
        .map(|(_, map)| map)
        .map_err(|_| SdpError::not_rtpmap_line(line))
}

/// Strict wrapper around [`parse_fmtp_line`] returning a crate error
pub fn fmtp(line: &str) -> Result<(&str, &str)> {
    parse_fmtp_line(line)
        .map(|(_, parts)| parts)
        .map_err(|_| SdpError::not_fmtp_line(line))
}
