//! Format parameter (fmtp) codec
//!
//! An fmtp attribute carries codec specific configuration as a
//! `;`-separated list of `key=value` entries. Entries without `=` are flags
//! and are stored with an empty value.
//!
//! ```text
//! a=fmtp:111 minptime=10;useinbandfec=1;stereo=1
//!        ^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//!        PT  parameter string
//! ```
//!
//! [`ParamMap`] keeps insertion order so that serialization is stable, but
//! compares as an unordered mapping.

use std::fmt;

use indexmap::IndexMap;

use crate::error::Result;
use crate::parser;

/// Key/value parameters of one fmtp line
///
/// An empty value represents a flag-only parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: IndexMap<String, String>,
}

impl ParamMap {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse either a bare parameter string or a full `a=fmtp:<pt> <params>` line
    ///
    /// If the input looks like an fmtp line only its parameter portion is
    /// used; anything else is treated as a parameter string.
    ///
    /// # Examples
    ///
    /// ```
    /// use cleanlink_sdp_core::fmtp::ParamMap;
    ///
    /// let from_line = ParamMap::parse("a=fmtp:111 stereo=1; usedtx=0");
    /// let from_params = ParamMap::parse("usedtx=0;stereo=1");
    /// assert_eq!(from_line, from_params);
    /// assert_eq!(from_line.get("stereo"), Some("1"));
    /// ```
    pub fn parse(input: &str) -> Self {
        let normalized = input.trim();
        match parser::fmtp(normalized) {
            Ok((_, params)) => Self::parse_params(params),
            Err(_) => Self::parse_params(normalized),
        }
    }

    /// Parse a `;`-separated parameter string
    ///
    /// Entries are trimmed, empty entries dropped and each entry is split on
    /// its first `=`. Later duplicates overwrite earlier values.
    pub fn parse_params(params: &str) -> Self {
        let mut map = Self::new();
        for entry in params.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = match entry.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (entry, ""),
            };
            if key.is_empty() {
                continue;
            }
            map.insert(key, value);
        }
        map
    }

    /// Serialize back into a parameter string
    ///
    /// Flags are written without `=`; entries are joined with `;` in
    /// insertion order.
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Look up a parameter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether a parameter (value or flag) is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite a parameter, keeping the position of an existing key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a parameter, keeping the order of the remaining ones
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no parameters
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl serde::Serialize for ParamMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.entries, serializer)
    }
}

/// A complete `a=fmtp` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmtpLine {
    /// Payload type the parameters apply to
    pub payload_type: String,
    /// The parsed parameters
    pub params: ParamMap,
}

impl FmtpLine {
    /// Parse a full `a=fmtp:<pt> <params>` line
    pub fn parse(line: &str) -> Result<Self> {
        let (payload_type, params) = parser::fmtp(line)?;
        Ok(Self {
            payload_type: payload_type.to_string(),
            params: ParamMap::parse_params(params),
        })
    }
}

impl fmt::Display for FmtpLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a=fmtp:{} {}", self.payload_type, self.params)
    }
}
