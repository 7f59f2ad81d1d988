use thiserror::Error;

/// Errors surfaced by the streaming core and its collaborators.
///
/// Only `InvalidArgument` ever reaches a caller synchronously; the rest are
/// handled by the controller and observed as a `failed` state notification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("capture failed: {0}")]
    CaptureFailure(String),

    #[error("encoding failed: {0}")]
    EncodeFailure(String),

    #[error("transport failed: {0}")]
    TransportFailure(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl StreamError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::CaptureFailure(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::EncodeFailure(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportFailure(msg.into())
    }
}
