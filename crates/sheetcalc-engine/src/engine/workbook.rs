//! Interfaces the engine reads workbooks through.
//!
//! Storage layers implement these traits; the engine never mutates cells.

use super::cell_ref::CellCoordinate;
use super::token::Formula;
use super::value::{ErrorCode, ValueEval};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CellKind {
    Blank,
    Number,
    Text,
    Boolean,
    Error,
    Formula,
}

/// A stored cell: a literal or a parsed formula.
#[derive(Clone, Debug, PartialEq)]
pub enum EvaluationCell {
    Blank,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorCode),
    Formula(Formula),
}

impl EvaluationCell {
    pub fn kind(&self) -> CellKind {
        match self {
            EvaluationCell::Blank => CellKind::Blank,
            EvaluationCell::Number(_) => CellKind::Number,
            EvaluationCell::Text(_) => CellKind::Text,
            EvaluationCell::Boolean(_) => CellKind::Boolean,
            EvaluationCell::Error(_) => CellKind::Error,
            EvaluationCell::Formula(_) => CellKind::Formula,
        }
    }

    pub fn formula(&self) -> Option<&Formula> {
        match self {
            EvaluationCell::Formula(formula) => Some(formula),
            _ => None,
        }
    }

    /// The stored value of a literal cell; None for formula cells.
    pub fn literal_value(&self) -> Option<ValueEval> {
        let value = match self {
            EvaluationCell::Blank => ValueEval::Blank,
            EvaluationCell::Number(n) => ValueEval::Number(*n),
            EvaluationCell::Text(s) => ValueEval::Text(s.clone()),
            EvaluationCell::Boolean(b) => ValueEval::Boolean(*b),
            EvaluationCell::Error(code) => ValueEval::Error(*code),
            EvaluationCell::Formula(_) => return None,
        };
        Some(value)
    }
}

pub trait EvaluationSheet {
    fn cell(&self, row: usize, col: usize) -> Option<EvaluationCell>;

    /// Highest row index holding any cell, None for an empty sheet.
    fn last_row_num(&self) -> Option<usize>;

    fn is_row_hidden(&self, row: usize) -> bool;
}

pub trait EvaluationWorkbook {
    fn sheet_count(&self) -> usize;

    fn sheet_name(&self, index: usize) -> Option<&str>;

    fn sheet(&self, index: usize) -> Option<&dyn EvaluationSheet>;

    /// Sheet names match case-insensitively.
    fn sheet_index(&self, name: &str) -> Option<usize> {
        (0..self.sheet_count()).find(|&index| {
            self.sheet_name(index)
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
        })
    }

    fn active_sheet_index(&self) -> usize {
        0
    }

    fn formula_tokens(&self, coord: CellCoordinate) -> Option<Formula> {
        self.sheet(coord.sheet_index)?
            .cell(coord.row, coord.col)?
            .formula()
            .cloned()
    }

    /// Program of a defined name, looked up from the given sheet.
    fn defined_name(&self, _name: &str, _sheet_index: usize) -> Option<Formula> {
        None
    }
}
