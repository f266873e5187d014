//! Error Definitions
//!
//! Defines the error types used throughout the engine. Every external
//! invocation failure carries the fully reconstructed command line so a
//! failing run can be reproduced from a shell.

use std::path::PathBuf;

use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum ClipError {
    /// Invariant violation in clip settings. Raised at construction, never retried.
    #[error("Invalid clip settings: {0}")]
    Configuration(String),

    /// Dimension or stream-metadata query produced unusable output.
    #[error("Probe failed: {0}")]
    Probe(String),

    /// No matching subtitle track, or extraction produced no usable output.
    #[error("Subtitle extraction failed: {0}")]
    Extraction(String),

    /// External process reported failure.
    #[error("External tool failed: {message} (command: {command})")]
    ToolInvocation { command: String, message: String },

    /// An expected file is absent after a nominally successful invocation.
    #[error("Expected output file is missing: {0}")]
    MissingArtifact(PathBuf),

    /// Non-contiguous multi-segment selection.
    #[error("Invalid segment sequence: {0}")]
    Sequence(String),

    /// External invocation exceeded the configured deadline.
    #[error("External tool timed out (command: {command})")]
    Timeout { command: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClipResult<T> = Result<T, ClipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_invocation_display_includes_command() {
        let err = ClipError::ToolInvocation {
            command: "ffmpeg -y -i in.mp4 out.gif".to_string(),
            message: "exit code 1".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("ffmpeg -y -i in.mp4 out.gif"));
        assert!(text.contains("exit code 1"));
    }

    #[test]
    fn test_configuration_display() {
        let err = ClipError::Configuration("start must be before end".to_string());
        assert!(err.to_string().contains("start must be before end"));
    }
}
