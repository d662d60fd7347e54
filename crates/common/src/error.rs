//! Error types shared across Veil crates.

/// Top-level error type for Veil operations.
#[derive(Debug, thiserror::Error)]
pub enum VeilError {
    #[error("Unauthorized bridge channel: {channel}")]
    UnauthorizedChannel { channel: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Host unavailable: {message}")]
    HostUnavailable { message: String },

    #[error("A capture session is already active")]
    SessionAlreadyActive,

    #[error("Overlay capture exclusion could not be confirmed: {message}")]
    ExclusionAssertFailed { message: String },

    #[error("Host rejected request: {reason}")]
    HostRejected { reason: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Platform error: {message}")]
    Platform { message: String },

    #[error("Assistant error: {message}")]
    Assistant { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VeilError.
pub type VeilResult<T> = Result<T, VeilError>;

impl VeilError {
    pub fn unauthorized_channel(channel: impl Into<String>) -> Self {
        Self::UnauthorizedChannel {
            channel: channel.into(),
        }
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn host_unavailable(msg: impl Into<String>) -> Self {
        Self::HostUnavailable {
            message: msg.into(),
        }
    }

    pub fn exclusion_assert_failed(msg: impl Into<String>) -> Self {
        Self::ExclusionAssertFailed {
            message: msg.into(),
        }
    }

    pub fn host_rejected(reason: impl Into<String>) -> Self {
        Self::HostRejected {
            reason: reason.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol {
            message: msg.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            message: msg.into(),
        }
    }

    pub fn assistant(msg: impl Into<String>) -> Self {
        Self::Assistant {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Short machine-readable reason, used as the `Failed(reason)` payload
    /// of a capture session.
    pub fn reason(&self) -> String {
        match self {
            Self::HostRejected { reason } => reason.clone(),
            Self::PermissionDenied { .. } => "PermissionDenied".to_string(),
            Self::HostUnavailable { .. } => "HostUnavailable".to_string(),
            Self::UnauthorizedChannel { .. } => "UnauthorizedChannel".to_string(),
            Self::SessionAlreadyActive => "SessionAlreadyActive".to_string(),
            Self::ExclusionAssertFailed { .. } => "ExclusionAssertFailed".to_string(),
            other => other.to_string(),
        }
    }
}
