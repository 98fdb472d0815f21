//! Contract errors for the evaluation engine.
//!
//! These report misuse of the engine API by its caller (bad indexes, malformed
//! token programs, runaway recursion). Spreadsheet-visible conditions such as
//! `#DIV/0!` are not errors here; they travel as [`ValueEval::Error`] values.
//!
//! [`ValueEval::Error`]: super::ValueEval::Error

use thiserror::Error;

/// Errors reported to the caller of the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Sheet index {0} does not exist")]
    SheetIndexOutOfRange(usize),

    #[error("Sheet '{0}' does not exist")]
    SheetNotFound(String),

    #[error("Malformed token program: {0}")]
    MalformedProgram(String),

    #[error("Evaluation exceeded the maximum depth of {limit}")]
    RecursionLimit { limit: usize },
}

pub type Result<T> = std::result::Result<T, EvalError>;
