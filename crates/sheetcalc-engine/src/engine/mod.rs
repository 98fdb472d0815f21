//! Spreadsheet evaluation engine API.
//!
//! - [`ValueEval`], [`ErrorCode`] - evaluation results and spreadsheet errors
//! - [`RefEval`], [`AreaEval`] - lazy reference and area views
//! - [`Formula`], [`Token`] - token programs and relative shifting
//! - [`EvaluationWorkbook`], [`EvaluationSheet`] - workbook access traits
//! - [`SheetRefEvaluator`], [`SheetRangeEvaluator`] - sheet and 3-D resolution
//! - [`WorkbookEvaluator`] - the evaluator with its result cache
//! - [`CellRef`], [`CellRangeAddress`] - A1 addressing

mod area;
mod cache;
mod cell_ref;
mod config;
mod cycle;
mod error;
mod eval;
mod format;
mod operators;
mod sheet_eval;
mod token;
mod value;
mod workbook;

#[cfg(test)]
pub(crate) mod fixtures;

pub use area::{AreaEval, CellSource, RefEval, SheetIndexRange};
pub use cache::{EvaluationListener, EvaluationStats};
pub use cell_ref::{
    CellAddress, CellCoordinate, CellRangeAddress, CellRef, CellReference, MAX_COLUMNS, MAX_ROWS,
};
pub use config::{DEFAULT_MAX_DEPTH, EvaluatorConfig};
pub use error::{EvalError, Result};
pub use eval::{OperationEvaluationContext, WorkbookEvaluator};
pub use format::{format_number, format_value};
pub use operators::compare;
pub(crate) use operators::power;
pub use sheet_eval::{SheetRangeEvaluator, SheetRefEvaluator};
pub use token::{AreaAddress, BinaryOp, Formula, SheetSpan, Token, UnaryOp};
pub(crate) use value::try_value;
pub use value::{ErrorCode, ValueEval, parse_number};
pub use workbook::{CellKind, EvaluationCell, EvaluationSheet, EvaluationWorkbook};
