//! Error types for SDP parsing and policy construction
//!
//! Rewriting itself never fails: malformed SDP simply has nothing to rewrite.
//! These errors surface from the strict line parsers and from building an
//! [`OpusPolicy`](crate::policy::OpusPolicy) out of untrusted configuration.

use thiserror::Error;

/// Result type alias for SDP operations
pub type Result<T> = std::result::Result<T, SdpError>;

/// Errors raised by the strict SDP line parsers and policy builders
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdpError {
    /// The line is not an `a=fmtp:<pt> <params>` attribute
    #[error("Not an fmtp attribute line: {line}")]
    NotFmtpLine { line: String },

    /// The line is not an `a=rtpmap:<pt> <encoding>/<clock>` attribute
    #[error("Not an rtpmap attribute line: {line}")]
    NotRtpmapLine { line: String },

    /// A policy entry cannot be serialized into an fmtp parameter string
    #[error("Invalid policy entry {key:?}={value:?}: {reason}")]
    InvalidPolicyEntry {
        key: String,
        value: String,
        reason: String,
    },
}

impl SdpError {
    /// Create a new "not an fmtp line" error
    pub fn not_fmtp_line(line: impl Into<String>) -> Self {
        Self::NotFmtpLine { line: line.into() }
    }

    /// Create a new "not an rtpmap line" error
    pub fn not_rtpmap_line(line: impl Into<String>) -> Self {
        Self::NotRtpmapLine { line: line.into() }
    }

    /// Create a new invalid policy entry error
    pub fn invalid_policy_entry(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidPolicyEntry {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SdpError::not_fmtp_line("a=rtpmap:111 opus/48000/2");
        assert_eq!(err.to_string(), "Not an fmtp attribute line: a=rtpmap:111 opus/48000/2");

        let err = SdpError::invalid_policy_entry("stereo", "1;x", "value contains ';'");
        assert!(err.to_string().contains("value contains ';'"));
    }
}
