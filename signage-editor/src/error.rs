use thiserror::Error;

pub type EditorResult<T> = Result<T, EditorError>;

/// Failures the host side can observe. Runtime-side problems (unknown ids, rejected CSS)
/// are never represented here: they are logged and dropped inside the frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Editor frame is not available")]
    FrameUnavailable,

    #[error("Serialization timed out after {timeout_ms}ms")]
    SerializeTimeout { timeout_ms: u64 },

    #[error("Serialization returned an empty document")]
    EmptySerialization,

    #[error("A serialization request is already in flight")]
    SerializeInFlight,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Check failed: {0}")]
    CheckFailed(String),
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Protocol(e.to_string())
    }
}

impl From<std::io::Error> for EditorError {
    fn from(e: std::io::Error) -> Self {
        EditorError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for EditorError {
    fn from(e: serde_yaml::Error) -> Self {
        EditorError::Config(e.to_string())
    }
}
