//! Error types for the validating LSTM wrapper.
//!
//! The numerical core never returns these: its shape contracts are
//! preconditions. Only configuration, setup and [`LstmCell`](crate::LstmCell)
//! buffer checks report errors.

use thiserror::Error;

/// Result type for LSTM setup and execution
pub type LstmResult<T> = Result<T, LstmError>;

/// Errors raised while configuring or binding an LSTM cell
#[derive(Debug, Error)]
pub enum LstmError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch for `{buffer}`: expected {expected} elements, got {got}")]
    ShapeMismatch {
        buffer: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Unsupported kernel: {0}")]
    UnsupportedKernel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl LstmError {
    /// Returns `Ok(())` when `got == expected`, a [`LstmError::ShapeMismatch`] otherwise.
    pub fn check_len(buffer: &'static str, expected: usize, got: usize) -> LstmResult<()> {
        if expected == got {
            Ok(())
        } else {
            Err(LstmError::ShapeMismatch { buffer, expected, got })
        }
    }
}
