//! Error types for prompt-pulse
//!
//! All modules use `PulseResult<T>` as their return type. Cache reads never
//! surface errors; only mutating operations and the prefetch channel do.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for prompt-pulse operations
pub type PulseResult<T> = Result<T, PulseError>;

/// All errors that can occur in prompt-pulse
#[derive(Error, Debug)]
pub enum PulseError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Session errors
    #[error("No images found in {0}")]
    NoImages(PathBuf),

    // Render errors
    #[error("Render failed for {path}: {reason}")]
    RenderFailed { path: PathBuf, reason: String },

    #[error("Prefetch cancelled")]
    Cancelled,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl PulseError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a render failure for an image path
    pub fn render_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::RenderFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cancelled | Self::RenderFailed { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoImages(_) => {
                Some("Add png/jpg/jpeg/gif/webp/bmp files to the image directory ([images] dir)")
            }
            Self::ConfigInvalid { .. } => Some("Run: ppulse config init --force"),
            Self::CommandFailed { .. } => {
                Some("Check that the renderer program ([render] program) is installed")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PulseError::NoImages(PathBuf::from("/pics"));
        assert_eq!(err.to_string(), "No images found in /pics");
    }

    #[test]
    fn error_hint() {
        let err = PulseError::NoImages(PathBuf::from("/pics"));
        assert!(err.hint().unwrap().contains("png"));
        assert!(PulseError::Cancelled.hint().is_none());
    }

    #[test]
    fn error_retryable() {
        assert!(PulseError::Cancelled.is_retryable());
        assert!(PulseError::render_failed("/a.png", "boom").is_retryable());
        assert!(!PulseError::NoImages(PathBuf::from("/pics")).is_retryable());
    }

    #[test]
    fn io_error_keeps_context() {
        let err = PulseError::io(
            "writing payload",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "IO error: writing payload");
        assert!(std::error::Error::source(&err).is_some());
    }
}
