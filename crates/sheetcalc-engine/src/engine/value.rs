//! Evaluation result values.
//!
//! Every operator and function consumes and produces [`ValueEval`]. Errors are
//! ordinary values: coercions report them as `Err(ErrorCode)` and the calling
//! operator folds them back into [`ValueEval::Error`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::area::{AreaEval, RefEval};
use super::format::format_value;

/// Spreadsheet-visible error values.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ErrorCode {
    DivZero,
    ValueInvalid,
    RefInvalid,
    NameInvalid,
    NumError,
    Na,
    CircularRef,
}

impl ErrorCode {
    /// The text a spreadsheet shows for this error.
    pub fn text(&self) -> &'static str {
        match self {
            ErrorCode::DivZero => "#DIV/0!",
            ErrorCode::ValueInvalid => "#VALUE!",
            ErrorCode::RefInvalid => "#REF!",
            ErrorCode::NameInvalid => "#NAME?",
            ErrorCode::NumError => "#NUM!",
            ErrorCode::Na => "#N/A",
            ErrorCode::CircularRef => "~CIRCULAR~REF~",
        }
    }

    pub fn from_text(text: &str) -> Option<ErrorCode> {
        let code = match text {
            "#DIV/0!" => ErrorCode::DivZero,
            "#VALUE!" => ErrorCode::ValueInvalid,
            "#REF!" => ErrorCode::RefInvalid,
            "#NAME?" => ErrorCode::NameInvalid,
            "#NUM!" => ErrorCode::NumError,
            "#N/A" => ErrorCode::Na,
            "~CIRCULAR~REF~" => ErrorCode::CircularRef,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Result of evaluating a token, a formula or a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueEval {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorCode),
    Blank,
    /// Unresolved single-cell reference; dereferenced on demand.
    Ref(RefEval),
    /// Rectangular block of values, sheet-backed or materialized.
    Area(AreaEval),
}

impl ValueEval {
    pub fn is_error(&self) -> bool {
        matches!(self, ValueEval::Error(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ValueEval::Blank)
    }

    /// True for values that need dereferencing before use as a scalar.
    pub fn is_reference(&self) -> bool {
        matches!(self, ValueEval::Ref(_) | ValueEval::Area(_))
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ValueEval::Error(code) => Some(*code),
            _ => None,
        }
    }

    /// Coerce a scalar to a number.
    ///
    /// Blank is zero, booleans are 1/0, text must parse as a number.
    /// References must be dereferenced first and report `#VALUE!`.
    pub fn to_number(&self) -> Result<f64, ErrorCode> {
        match self {
            ValueEval::Number(n) => Ok(*n),
            ValueEval::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            ValueEval::Blank => Ok(0.0),
            ValueEval::Text(s) => parse_number(s).ok_or(ErrorCode::ValueInvalid),
            ValueEval::Error(code) => Err(*code),
            ValueEval::Ref(_) | ValueEval::Area(_) => Err(ErrorCode::ValueInvalid),
        }
    }

    /// Coerce a scalar to text.
    pub fn to_text(&self) -> Result<String, ErrorCode> {
        match self {
            ValueEval::Error(code) => Err(*code),
            ValueEval::Ref(_) | ValueEval::Area(_) => Err(ErrorCode::ValueInvalid),
            other => Ok(format_value(other)),
        }
    }

    /// Coerce a scalar to a boolean.
    ///
    /// Numbers are true when non-zero, blank is false, text must spell
    /// TRUE or FALSE (any case).
    pub fn to_boolean(&self) -> Result<bool, ErrorCode> {
        match self {
            ValueEval::Boolean(b) => Ok(*b),
            ValueEval::Number(n) => Ok(*n != 0.0),
            ValueEval::Blank => Ok(false),
            ValueEval::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(ErrorCode::ValueInvalid)
                }
            }
            ValueEval::Error(code) => Err(*code),
            ValueEval::Ref(_) | ValueEval::Area(_) => Err(ErrorCode::ValueInvalid),
        }
    }

    /// Wrap a computed number, mapping NaN and infinities to `#NUM!`.
    pub fn checked_number(n: f64) -> ValueEval {
        if n.is_finite() {
            ValueEval::Number(n)
        } else {
            ValueEval::Error(ErrorCode::NumError)
        }
    }
}

/// Parse text the way numeric coercion reads it: surrounding whitespace is
/// ignored and a trailing `%` divides by 100.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (digits, scale) = match trimmed.strip_suffix('%') {
        Some(rest) => (rest.trim_end(), 0.01),
        None => (trimmed, 1.0),
    };
    if !digits
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-' | b'e' | b'E'))
    {
        return None;
    }
    let n = digits.parse::<f64>().ok()? * scale;
    n.is_finite().then_some(n)
}

impl fmt::Display for ValueEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueEval::Ref(r) => write!(f, "{}", r),
            ValueEval::Area(a) => write!(f, "{}", a),
            other => f.write_str(&format_value(other)),
        }
    }
}

impl From<f64> for ValueEval {
    fn from(n: f64) -> Self {
        ValueEval::Number(n)
    }
}

impl From<bool> for ValueEval {
    fn from(b: bool) -> Self {
        ValueEval::Boolean(b)
    }
}

impl From<&str> for ValueEval {
    fn from(s: &str) -> Self {
        ValueEval::Text(s.to_string())
    }
}

impl From<String> for ValueEval {
    fn from(s: String) -> Self {
        ValueEval::Text(s)
    }
}

impl From<ErrorCode> for ValueEval {
    fn from(code: ErrorCode) -> Self {
        ValueEval::Error(code)
    }
}

/// Unwrap a coercion result, returning the error as a value from the
/// enclosing `Result<ValueEval>` function.
macro_rules! try_value {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(code) => return Ok($crate::engine::ValueEval::Error(code)),
        }
    };
}
pub(crate) use try_value;
