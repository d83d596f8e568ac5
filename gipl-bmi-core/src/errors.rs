use thiserror::Error;

/// Error type for every fallible adapter operation.
///
/// Registry and accessor errors are raised before any engine state is touched,
/// so a failed call never leaves engine-held data partially written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BmiError {
    #[error("Invalid configuration '{path}': {reason}")]
    Config { path: String, reason: String },
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Unknown grid '{0}'")]
    UnknownGrid(String),
    #[error("Variable '{0}' is already registered")]
    DuplicateName(String),
    #[error("Grid '{0}' is already registered")]
    DuplicateGrid(String),
    #[error("Shape mismatch for '{name}'. Expected {expected}, got {found}")]
    ShapeMismatch {
        name: String,
        expected: String,
        found: String,
    },
    #[error("Index {index} is out of range for '{name}' with {len} elements")]
    IndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },
    #[error("Shape of grid '{grid}' cannot be resolved: {reason}")]
    GridNotResolvable { grid: String, reason: String },
    #[error("Cannot {operation} while the model is {phase}")]
    Lifecycle { operation: String, phase: String },
    #[error("Engine failed during {operation}: {reason}")]
    EngineFailure { operation: String, reason: String },
    #[error("Variable '{0}' is read-only")]
    ReadOnly(String),
    #[error("Variable '{name}' maps to '{internal_name}' which the engine does not hold")]
    MissingEngineValue { name: String, internal_name: String },
}

impl BmiError {
    pub(crate) fn config(path: impl Into<String>, reason: impl Into<String>) -> Self {
        BmiError::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn engine(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        BmiError::EngineFailure {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error leaves the engine in an unusable state.
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, BmiError::EngineFailure { .. })
    }
}

/// Convenience type for `Result<T, BmiError>`.
pub type BmiResult<T> = Result<T, BmiError>;
