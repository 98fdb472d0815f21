//! Per-sheet and multi-sheet cell resolution.

use std::fmt;

use super::area::SheetIndexRange;
use super::cell_ref::CellCoordinate;
use super::error::{EvalError, Result};
use super::eval::WorkbookEvaluator;
use super::value::ValueEval;
use super::workbook::{EvaluationCell, EvaluationSheet};

/// Function whose cells are skipped by other subtotals.
const SUBTOTAL_FUNCTION: &str = "SUBTOTAL";

/// Resolves cells of one sheet, recursing into the evaluator for formulas.
pub struct SheetRefEvaluator<'e, 'w> {
    evaluator: &'e WorkbookEvaluator<'w>,
    sheet_index: usize,
    sheet: &'w dyn EvaluationSheet,
}

impl<'e, 'w> SheetRefEvaluator<'e, 'w> {
    pub(crate) fn new(evaluator: &'e WorkbookEvaluator<'w>, sheet_index: usize) -> Result<Self> {
        let sheet = evaluator
            .workbook()
            .sheet(sheet_index)
            .ok_or(EvalError::SheetIndexOutOfRange(sheet_index))?;
        Ok(SheetRefEvaluator {
            evaluator,
            sheet_index,
            sheet,
        })
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet_index
    }

    pub fn sheet_name(&self) -> &'w str {
        self.evaluator.workbook().sheet_name(self.sheet_index).unwrap_or("")
    }

    pub fn eval_cell(&self, row: usize, col: usize) -> Result<ValueEval> {
        self.evaluator
            .evaluate_cell_on(self.sheet, CellCoordinate::new(self.sheet_index, row, col))
    }

    /// True if the cell holds a formula that calls `SUBTOTAL`.
    pub fn is_subtotal(&self, row: usize, col: usize) -> bool {
        matches!(
            self.sheet.cell(row, col),
            Some(EvaluationCell::Formula(formula)) if formula.calls_function(SUBTOTAL_FUNCTION)
        )
    }

    pub fn is_row_hidden(&self, row: usize) -> bool {
        self.sheet.is_row_hidden(row)
    }

    pub fn last_row_num(&self) -> Option<usize> {
        self.sheet.last_row_num()
    }
}

/// Evaluation context for a reference spanning one or more consecutive sheets.
pub struct SheetRangeEvaluator<'e, 'w> {
    evaluator: &'e WorkbookEvaluator<'w>,
    sheets: SheetIndexRange,
}

impl<'e, 'w> SheetRangeEvaluator<'e, 'w> {
    pub(crate) fn new(evaluator: &'e WorkbookEvaluator<'w>, sheets: SheetIndexRange) -> Result<Self> {
        let count = evaluator.workbook().sheet_count();
        if sheets.last >= count {
            return Err(EvalError::SheetIndexOutOfRange(sheets.last));
        }
        Ok(SheetRangeEvaluator { evaluator, sheets })
    }

    pub fn first_sheet_index(&self) -> usize {
        self.sheets.first
    }

    pub fn last_sheet_index(&self) -> usize {
        self.sheets.last
    }

    pub fn sheets(&self) -> SheetIndexRange {
        self.sheets
    }

    pub fn sheet_evaluator(&self, sheet_index: usize) -> Result<SheetRefEvaluator<'e, 'w>> {
        if sheet_index < self.sheets.first || sheet_index > self.sheets.last {
            return Err(EvalError::SheetIndexOutOfRange(sheet_index));
        }
        SheetRefEvaluator::new(self.evaluator, sheet_index)
    }

    pub fn eval_cell(&self, sheet_index: usize, row: usize, col: usize) -> Result<ValueEval> {
        self.sheet_evaluator(sheet_index)?.eval_cell(row, col)
    }

    /// "Sheet1" or "Sheet1:Sheet3".
    pub fn sheet_name_range(&self) -> String {
        let workbook = self.evaluator.workbook();
        let first = workbook.sheet_name(self.sheets.first).unwrap_or("");
        if self.sheets.is_single() {
            first.to_string()
        } else {
            let last = workbook.sheet_name(self.sheets.last).unwrap_or("");
            format!("{}:{}", first, last)
        }
    }
}

impl fmt::Display for SheetRangeEvaluator<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SheetRangeEvaluator[{}]", self.sheet_name_range())
    }
}
