//! Error types for sheetcalc core.

use thiserror::Error;

use sheetcalc_engine::engine::EvalError;

/// Errors raised by the workbook model and the rule matching layer.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unknown sheet '{0}'")]
    UnknownSheet(String),

    #[error("No rule {rule_index} in formatting {formatting_index} of sheet '{sheet}'")]
    UnknownRule {
        sheet: String,
        formatting_index: usize,
        rule_index: usize,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
