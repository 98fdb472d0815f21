//! In-memory workbook implementing the engine's read interfaces.
//!
//! Cells live in a [`DashMap`] so they can be edited through `&Sheet` while
//! an evaluator borrows the workbook. Edits do not reach cached results
//! until the evaluator is told to invalidate.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use dashmap::{DashMap, DashSet};

use sheetcalc_engine::engine::{
    CellRef, EvaluationCell, EvaluationSheet, EvaluationWorkbook, Formula, Token,
};

use crate::conditional_formatting::{ConditionalFormatting, ConditionalFormattingSource};
use crate::error::{CoreError, Result};

#[derive(Debug, Default)]
pub struct Sheet {
    name: String,
    cells: DashMap<CellRef, EvaluationCell>,
    hidden_rows: DashSet<usize>,
    /// Stored cell count per row, kept in step with `cells`.
    row_occupancy: RwLock<BTreeMap<usize, usize>>,
    formattings: RwLock<Vec<ConditionalFormatting>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Sheet {
            name: name.into(),
            ..Sheet::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_cell(&self, cell: CellRef, value: EvaluationCell) {
        let mut occupancy = self.row_occupancy.write().unwrap_or_else(PoisonError::into_inner);
        if self.cells.insert(cell, value).is_none() {
            *occupancy.entry(cell.row).or_insert(0) += 1;
        }
    }

    pub fn set_number(&self, cell: CellRef, n: f64) {
        self.set_cell(cell, EvaluationCell::Number(n));
    }

    pub fn set_text(&self, cell: CellRef, text: impl Into<String>) {
        self.set_cell(cell, EvaluationCell::Text(text.into()));
    }

    pub fn set_formula(&self, cell: CellRef, tokens: Vec<Token>) {
        self.set_cell(cell, EvaluationCell::Formula(Formula::new(tokens)));
    }

    pub fn clear_cell(&self, cell: CellRef) -> Option<EvaluationCell> {
        let mut occupancy = self.row_occupancy.write().unwrap_or_else(PoisonError::into_inner);
        let (_, value) = self.cells.remove(&cell)?;
        if let Some(count) = occupancy.get_mut(&cell.row) {
            *count -= 1;
            if *count == 0 {
                occupancy.remove(&cell.row);
            }
        }
        Some(value)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn set_row_hidden(&self, row: usize, hidden: bool) {
        if hidden {
            self.hidden_rows.insert(row);
        } else {
            self.hidden_rows.remove(&row);
        }
    }

    /// Index of the new formatting.
    pub fn add_conditional_formatting(&self, formatting: ConditionalFormatting) -> usize {
        let mut formattings = self.formattings.write().unwrap_or_else(PoisonError::into_inner);
        formattings.push(formatting);
        formattings.len() - 1
    }

    pub fn clear_conditional_formattings(&self) {
        self.formattings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn conditional_formattings(&self) -> Vec<ConditionalFormatting> {
        self.formattings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EvaluationSheet for Sheet {
    fn cell(&self, row: usize, col: usize) -> Option<EvaluationCell> {
        self.cells
            .get(&CellRef::new(col, row))
            .map(|entry| entry.value().clone())
    }

    fn last_row_num(&self) -> Option<usize> {
        self.row_occupancy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_key_value()
            .map(|(row, _)| *row)
    }

    fn is_row_hidden(&self, row: usize) -> bool {
        self.hidden_rows.contains(&row)
    }
}

#[derive(Debug, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    active_sheet: usize,
    names: DashMap<String, Formula>,
}

impl Workbook {
    pub fn new() -> Self {
        Workbook::default()
    }

    pub fn with_sheets(names: &[&str]) -> Self {
        let mut workbook = Workbook::new();
        for name in names {
            workbook.add_sheet(*name);
        }
        workbook
    }

    /// Appends a sheet and returns its index.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> usize {
        self.sheets.push(Sheet::new(name));
        self.sheets.len() - 1
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_by_name(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CoreError::UnknownSheet(name.to_string()))
    }

    pub fn set_active_sheet(&mut self, index: usize) -> Result<()> {
        if index >= self.sheets.len() {
            return Err(CoreError::UnknownSheet(format!("#{}", index)));
        }
        self.active_sheet = index;
        Ok(())
    }

    /// Workbook-scoped; names match case-insensitively.
    pub fn define_name(&self, name: &str, tokens: Vec<Token>) {
        self.names.insert(name.to_uppercase(), Formula::new(tokens));
    }

    pub fn remove_name(&self, name: &str) -> Option<Formula> {
        self.names.remove(&name.to_uppercase()).map(|(_, formula)| formula)
    }
}

impl EvaluationWorkbook for Workbook {
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

    fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    fn defined_name(&self, name: &str, _sheet_index: usize) -> Option<Formula> {
        self.names
            .get(&name.to_uppercase())
            .map(|entry| entry.value().clone())
    }
}

impl ConditionalFormattingSource for Workbook {
    fn conditional_formattings(&self, sheet_index: usize) -> Vec<ConditionalFormatting> {
        self.sheets
            .get(sheet_index)
            .map(Sheet::conditional_formattings)
            .unwrap_or_default()
    }
}
