//! Error types for the session layer
//!
//! [`SessionError`] covers operations a caller asked for and can act on
//! (switching profile, setting gain, loading configuration).
//! [`CollaboratorError`] is what an adapter reports when a browser-side call
//! fails; the session catches those at the call site, logs them and carries on.

use cleanlink_sdp_core::SdpError;
use thiserror::Error;

use crate::profile::Profile;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Result type for collaborator calls
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Errors surfaced to callers of the session API
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested profile name is not known
    #[error("Unknown profile \"{name}\" (current profile: {current})")]
    UnknownProfile { name: String, current: Profile },

    /// The requested profile is already the active one
    #[error("Profile already active: {profile}")]
    ProfileAlreadyActive { profile: Profile },

    /// Gain must be a finite number
    #[error("Invalid gain {value}; keeping {current}")]
    InvalidGain { value: f64, current: f64 },

    /// Configuration is semantically invalid
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML for the expected shape
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Invalid SDP policy in configuration
    #[error("SDP error: {0}")]
    Sdp(#[from] SdpError),

    /// A collaborator call failed where the caller needs to know
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl SessionError {
    /// Create an unknown profile error
    pub fn unknown_profile(name: impl Into<String>, current: Profile) -> Self {
        Self::UnknownProfile {
            name: name.into(),
            current,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The profile that stays active after a rejected switch
    pub fn retained_profile(&self) -> Option<Profile> {
        match self {
            Self::UnknownProfile { current, .. } => Some(*current),
            Self::ProfileAlreadyActive { profile } => Some(*profile),
            _ => None,
        }
    }
}

/// Failures reported by browser-side collaborators
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The underlying object does not offer this operation
    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    /// The operation was attempted and rejected
    #[error("{operation} failed: {message}")]
    Failed { operation: String, message: String },

    /// The object is in a state where the operation makes no sense
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl CollaboratorError {
    /// Create an unsupported operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a failed operation error
    pub fn failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
