//! Error handling for the SCC SSA layer
//! 
//! The SSA layer itself has only two failure modes: the compilation context
//! running out of node storage, and internal contract violations. The latter
//! are assertions; everything that reaches a caller as a value is listed here.

use thiserror::Error;

/// Main error type shared by the SSA core and the driver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SsaError {
    #[error("Allocation failed: node budget of {limit} exhausted")]
    AllocationFailed { limit: usize },

    #[error("Verification of '{function}' failed: {message}")]
    Verification { function: String, message: String },

    #[error("Unknown sample module '{name}'")]
    UnknownSample { name: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Internal compiler error: {message}")]
    InternalError { message: String },
}

impl SsaError {
    /// Create a verification error for the named function
    pub fn verification(function: &str, message: String) -> Self {
        SsaError::Verification {
            function: function.to_string(),
            message,
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for SsaError {
    fn from(err: std::io::Error) -> Self {
        SsaError::IoError {
            message: err.to_string(),
        }
    }
}

/// Convert from String (for simple error cases)
impl From<String> for SsaError {
    fn from(message: String) -> Self {
        SsaError::InternalError { message }
    }
}
