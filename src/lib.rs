//! sheetcalc - Spreadsheet formula evaluation and conditional formatting.
//!
//! - [`sheetcalc_engine`] evaluates formula cells against any
//!   [`EvaluationWorkbook`] and caches their results.
//! - [`sheetcalc_core`] matches conditional formatting rules and provides an
//!   in-memory [`Workbook`].

pub use sheetcalc_core;
pub use sheetcalc_engine;

pub use sheetcalc_core::conditional_formatting::ConditionalFormattingEvaluator;
pub use sheetcalc_core::{Config, CoreError, Sheet, Workbook, load_config, parse_config};
pub use sheetcalc_engine::engine::{
    CellCoordinate, CellRef, CellReference, ErrorCode, EvalError, EvaluationWorkbook, Formula,
    Token, ValueEval, WorkbookEvaluator,
};
