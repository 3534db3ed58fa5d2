//! Opus parameter policy and merge rules
//!
//! A policy is the fixed set of fmtp parameters that must end up on every
//! Opus payload type. Merging is a pure function: the deprecated `cbr` key
//! is dropped, then every policy key overwrites whatever was negotiated.
//! Keys the policy does not mention are left untouched and in place.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdpError};
use crate::fmtp::ParamMap;

/// Keys removed from every merged parameter map
pub const DEPRECATED_KEYS: &[&str] = &["cbr"];

/// Default Opus target bitrate in bits per second
pub const DEFAULT_MAX_AVERAGE_BITRATE: u32 = 128_000;

/// Required Opus fmtp parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, String>", into = "IndexMap<String, String>")]
pub struct OpusPolicy {
    params: IndexMap<String, String>,
}

impl OpusPolicy {
    /// Music-oriented policy at the default bitrate
    ///
    /// Full band playback and capture, stereo both ways, DTX off and in-band
    /// FEC on.
    pub fn music() -> Self {
        Self::music_with_bitrate(DEFAULT_MAX_AVERAGE_BITRATE)
    }

    /// Music-oriented policy at a specific `maxaveragebitrate`
    pub fn music_with_bitrate(max_average_bitrate: u32) -> Self {
        let params = [
            ("maxplaybackrate", "48000".to_string()),
            ("sprop-maxcapturerate", "48000".to_string()),
            ("maxaveragebitrate", max_average_bitrate.to_string()),
            ("stereo", "1".to_string()),
            ("sprop-stereo", "1".to_string()),
            ("usedtx", "0".to_string()),
            ("useinbandfec", "1".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { params }
    }

    /// Build a policy from arbitrary pairs, validating every entry
    ///
    /// Keys must be non-empty and free of whitespace, `;` and `=`. Values
    /// must not contain `;` or surrounding whitespace, otherwise a rewritten
    /// line would not parse back to the same value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = IndexMap::new();
        for (key, value) in pairs {
            let (key, value) = (key.into(), value.into());
            validate_entry(&key, &value)?;
            params.insert(key, value);
        }
        Ok(Self { params })
    }

    /// Required value for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Iterate over required `(key, value)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Required keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Number of required keys
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the policy requires nothing
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Merge this policy into an existing parameter map
    pub fn apply(&self, existing: &ParamMap) -> ParamMap {
        merge(existing, self)
    }
}

impl Default for OpusPolicy {
    fn default() -> Self {
        Self::music()
    }
}

impl TryFrom<IndexMap<String, String>> for OpusPolicy {
    type Error = SdpError;

    fn try_from(params: IndexMap<String, String>) -> Result<Self> {
        Self::from_pairs(params)
    }
}

impl From<OpusPolicy> for IndexMap<String, String> {
    fn from(policy: OpusPolicy) -> Self {
        policy.params
    }
}

fn validate_entry(key: &str, value: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SdpError::invalid_policy_entry(key, value, "empty key"));
    }
    if key.chars().any(|c| c == ';' || c == '=' || c.is_whitespace()) {
        return Err(SdpError::invalid_policy_entry(
            key,
            value,
            "key contains ';', '=' or whitespace",
        ));
    }
    if value.contains(';') {
        return Err(SdpError::invalid_policy_entry(key, value, "value contains ';'"));
    }
    if value.trim() != value {
        return Err(SdpError::invalid_policy_entry(
            key,
            value,
            "value has surrounding whitespace",
        ));
    }
    Ok(())
}

/// Merge a policy into existing fmtp parameters
///
/// Deprecated keys are removed first, then every policy entry is written,
/// replacing any pre-existing value.
///
/// # Examples
///
/// ```
/// use cleanlink_sdp_core::fmtp::ParamMap;
/// use cleanlink_sdp_core::policy::{merge, OpusPolicy};
///
/// let existing = ParamMap::parse("maxaveragebitrate=64000;cbr=1");
/// let policy = OpusPolicy::from_pairs([("maxaveragebitrate", "128000"), ("stereo", "1")]).unwrap();
///
/// let merged = merge(&existing, &policy);
/// assert_eq!(merged.get("maxaveragebitrate"), Some("128000"));
/// assert_eq!(merged.get("stereo"), Some("1"));
/// assert!(!merged.contains_key("cbr"));
/// ```
pub fn merge(existing: &ParamMap, policy: &OpusPolicy) -> ParamMap {
    let mut merged = existing.clone();
    for key in DEPRECATED_KEYS {
        merged.remove(key);
    }
    for (key, value) in policy.iter() {
        merged.insert(key, value);
    }
    merged
}
