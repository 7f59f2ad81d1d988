use serde::{Deserialize, Serialize};

/// Streaming session state machine.
///
/// State transitions:
/// ```text
/// disconnected → connecting → streaming
///      ↑  ↑          ↓            ↓
///      │  └──────── failed ←──────┘
///      └──────────── (stop / graceful close)
/// ```
///
/// `Failed` is reported once the failed session's handles are released,
/// and is always followed by `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Disconnected,
    Connecting,
    Streaming,
    Failed,
}

impl StreamState {
    /// Lowercase name used in observer payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Failed => "failed",
        }
    }

    /// Whether a session owns live handles in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming)
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered to the registered [`StateObserver`](crate::StateObserver).
///
/// Serializes to `{"state":"streaming"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEvent {
    pub state: StreamState,
}

impl StateEvent {
    pub fn new(state: StreamState) -> Self {
        Self { state }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!(r#"{{"state":"{}"}}"#, self.state))
    }
}
