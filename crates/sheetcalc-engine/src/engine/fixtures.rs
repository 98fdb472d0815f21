//! Minimal in-memory workbook for unit tests.

use std::collections::{HashMap, HashSet};

use super::cell_ref::CellRef;
use super::token::{Formula, Token};
use super::workbook::{EvaluationCell, EvaluationSheet, EvaluationWorkbook};

#[derive(Default)]
pub(crate) struct TestSheet {
    name: String,
    cells: HashMap<CellRef, EvaluationCell>,
    hidden: HashSet<usize>,
}

impl EvaluationSheet for TestSheet {
    fn cell(&self, row: usize, col: usize) -> Option<EvaluationCell> {
        self.cells.get(&CellRef::new(col, row)).cloned()
    }

    fn last_row_num(&self) -> Option<usize> {
        self.cells.keys().map(|cell| cell.row).max()
    }

    fn is_row_hidden(&self, row: usize) -> bool {
        self.hidden.contains(&row)
    }
}

#[derive(Default)]
pub(crate) struct TestWorkbook {
    sheets: Vec<TestSheet>,
    names: HashMap<String, Formula>,
}

impl TestWorkbook {
    pub(crate) fn new(sheet_names: &[&str]) -> Self {
        TestWorkbook {
            sheets: sheet_names
                .iter()
                .map(|name| TestSheet {
                    name: name.to_string(),
                    ..TestSheet::default()
                })
                .collect(),
            names: HashMap::new(),
        }
    }

    pub(crate) fn set(&mut self, sheet: usize, a1: &str, cell: EvaluationCell) {
        let cell_ref = CellRef::from_str(a1).unwrap();
        self.sheets[sheet].cells.insert(cell_ref, cell);
    }

    pub(crate) fn number(&mut self, sheet: usize, a1: &str, n: f64) {
        self.set(sheet, a1, EvaluationCell::Number(n));
    }

    pub(crate) fn text(&mut self, sheet: usize, a1: &str, s: &str) {
        self.set(sheet, a1, EvaluationCell::Text(s.to_string()));
    }

    pub(crate) fn formula(&mut self, sheet: usize, a1: &str, tokens: Vec<Token>) {
        self.set(sheet, a1, EvaluationCell::Formula(Formula::new(tokens)));
    }

    pub(crate) fn hide_row(&mut self, sheet: usize, row: usize) {
        self.sheets[sheet].hidden.insert(row);
    }

    pub(crate) fn define_name(&mut self, name: &str, tokens: Vec<Token>) {
        self.names.insert(name.to_uppercase(), Formula::new(tokens));
    }
}

impl EvaluationWorkbook for TestWorkbook {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_name(&self, index: usize) -> Option<&str> {
        self.sheets.get(index).map(|sheet| sheet.name.as_str())
    }

    fn sheet(&self, index: usize) -> Option<&dyn EvaluationSheet> {
        self.sheets
            .get(index)
            .map(|sheet| sheet as &dyn EvaluationSheet)
    }

    fn defined_name(&self, name: &str, _sheet_index: usize) -> Option<Formula> {
        self.names.get(&name.to_uppercase()).cloned()
    }
}

/// Reference token from A1 text.
pub(crate) fn r(text: &str) -> Token {
    Token::reference(text).unwrap()
}

pub(crate) fn n(value: f64) -> Token {
    Token::Number(value)
}
