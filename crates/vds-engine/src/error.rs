//! Error types for simulator communication.

use std::path::PathBuf;

use thiserror::Error;
use vds_core::VdsError;

/// Errors that can occur while talking to the simulator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Simulator executable could not be located.
    #[error("OpenDSS executable '{binary}' not found. Install OpenDSS-C or set [engine] binary in vds.toml")]
    NotInstalled { binary: String },

    /// Simulator process failed to start.
    #[error("Failed to start simulator process {path}: {source}")]
    ProcessStart {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Simulator closed its output before answering.
    #[error("Simulator process exited while running '{command}'")]
    ProcessExited { command: String },

    /// The simulator rejected a command.
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    /// Unexpected framing or reply shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A reply could not be interpreted.
    #[error("Cannot parse reply to '{command}': {reply}")]
    Parse { command: String, reply: String },

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for simulator operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for VdsError {
    fn from(err: EngineError) -> Self {
        VdsError::Engine {
            step: None,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_engine_error() {
        let err: VdsError = EngineError::Command {
            command: "solve".into(),
            message: "Solution did not converge".into(),
        }
        .into();
        assert!(matches!(err, VdsError::Engine { step: None, .. }));
        assert!(err.to_string().contains("did not converge"));
    }
}
