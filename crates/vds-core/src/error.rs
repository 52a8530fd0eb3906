//! Unified error types for the dataset pipeline
//!
//! [`VdsError`] covers every failure the pipeline can surface: bad inputs,
//! topology mismatches, external engine faults and output I/O. None of them
//! are retried; each one ends the run for its circuit.

use thiserror::Error;

/// Unified error type for all dataset operations.
#[derive(Error, Debug)]
pub enum VdsError {
    /// I/O errors (file access, output directory, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input files
    #[error("Parse error: {0}")]
    Parse(String),

    /// A profile does not cover exactly one year of timesteps
    #[error("unexpected sample count for load '{load}': expected {expected}, found {actual}")]
    SampleCount {
        load: String,
        expected: usize,
        actual: usize,
    },

    /// The same load identifier was defined by two profile sources
    #[error("duplicate profile for load '{load}'")]
    DuplicateProfile { load: String },

    /// A profile references a load that the circuit does not define
    #[error("profile references load '{load}' which is not in the circuit topology")]
    UnknownLoad { load: String },

    /// A circuit load has no profile to drive it
    #[error("circuit load '{load}' has no matching profile")]
    MissingProfile { load: String },

    /// A reading returned a different number of channels than the load carries
    #[error("expected {expected} voltage channels for '{element}', engine returned {actual}")]
    ChannelMismatch {
        element: String,
        expected: usize,
        actual: usize,
    },

    /// External engine failure, optionally tied to the timestep it happened at
    #[error("engine error{}: {message}", step_suffix(.step))]
    Engine { step: Option<usize>, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Illegal move in the run state machine
    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

fn step_suffix(step: &Option<usize>) -> String {
    step.map(|s| format!(" at timestep {s}")).unwrap_or_default()
}

/// Convenience type alias for Results using VdsError.
pub type VdsResult<T> = Result<T, VdsError>;

impl VdsError {
    /// Attach a timestep index to an engine error that does not carry one yet.
    pub fn at_step(self, step: usize) -> Self {
        match self {
            VdsError::Engine { step: None, message } => VdsError::Engine {
                step: Some(step),
                message,
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for VdsError {
    fn from(err: serde_json::Error) -> Self {
        VdsError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_display() {
        let err = VdsError::SampleCount {
            load: "l1".into(),
            expected: 35_040,
            actual: 35_039,
        };
        let msg = err.to_string();
        assert!(msg.contains("unexpected sample count"));
        assert!(msg.contains("35039"));
    }

    #[test]
    fn test_unknown_load_names_identifier() {
        let err = VdsError::UnknownLoad { load: "X1".into() };
        assert!(err.to_string().contains("'X1'"));
    }

    #[test]
    fn test_at_step_only_fills_missing_step() {
        let err = VdsError::Engine {
            step: None,
            message: "solution did not converge".into(),
        }
        .at_step(12);
        assert!(matches!(err, VdsError::Engine { step: Some(12), .. }));
        assert!(err.to_string().contains("timestep 12"));

        let err = err.at_step(99);
        assert!(matches!(err, VdsError::Engine { step: Some(12), .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: VdsError = io_err.into();
        assert!(matches!(err, VdsError::Io(_)));
    }
}
