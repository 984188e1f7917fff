//! Error types shared across Cuegrid crates.
//!
//! Only faults that the show cannot absorb are modelled here. Refusals the
//! operator can act on (duplicate file, stale transition, empty slot) are
//! reported by the engine as notices, never as errors.

use std::path::PathBuf;

/// Top-level error type for Cuegrid operations.
#[derive(Debug, thiserror::Error)]
pub enum CueError {
    #[error("Surface error: {message}")]
    Surface { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Device error: {message}")]
    Device { message: String },

    #[error("Show error: {message}")]
    Show { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Engine stopped")]
    EngineStopped,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CueError.
pub type CueResult<T> = Result<T, CueError>;

impl CueError {
    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device {
            message: msg.into(),
        }
    }

    pub fn show(msg: impl Into<String>) -> Self {
        Self::Show {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error came from an output that can be torn down under us
    /// (window closed, device unplugged). The show carries on without it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Device { .. } | Self::Surface { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CueError::surface("window closed").is_transient());
        assert!(CueError::device("no sink").is_transient());
        assert!(!CueError::show("bad grid").is_transient());
        assert!(!CueError::audio("decoder refused file").is_transient());
        assert!(!CueError::EngineStopped.is_transient());
    }

    #[test]
    fn test_display_includes_message() {
        let err = CueError::audio("decoder refused file");
        assert_eq!(err.to_string(), "Audio error: decoder refused file");
    }
}
