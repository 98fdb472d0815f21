//! Workbook evaluation orchestrator.
//!
//! [`WorkbookEvaluator`] computes cell values from a borrowed
//! [`EvaluationWorkbook`]. Formula cells run their token program on a value
//! stack; references on that stack stay lazy until an operator or function
//! needs their values, at which point they resolve back through this
//! evaluator. Computed formula results are cached per [`CellCoordinate`]
//! until the caller invalidates them.
//!
//! The evaluator is single-threaded. All caches live in `RefCell`s so
//! evaluation only needs `&self`.

use std::cell::RefCell;
use std::collections::HashMap;

use log::{debug, trace};

use crate::builtins;

use super::area::{AreaEval, CellSource, RefEval, SheetIndexRange};
use super::cache::{EvaluationCache, EvaluationListener, EvaluationStats};
use super::cell_ref::{CellCoordinate, CellRangeAddress, CellRef};
use super::config::EvaluatorConfig;
use super::cycle::EvaluationTracker;
use super::error::{EvalError, Result};
use super::operators;
use super::sheet_eval::{SheetRangeEvaluator, SheetRefEvaluator};
use super::token::{Formula, SheetSpan, Token};
use super::value::{ErrorCode, ValueEval};
use super::workbook::{EvaluationSheet, EvaluationWorkbook};

pub struct WorkbookEvaluator<'w> {
    workbook: &'w dyn EvaluationWorkbook,
    config: EvaluatorConfig,
    tracker: EvaluationTracker,
    cache: RefCell<EvaluationCache>,
    sheet_indexes: RefCell<HashMap<String, Option<usize>>>,
    listener: Option<Box<dyn EvaluationListener + 'w>>,
}

impl<'w> WorkbookEvaluator<'w> {
    pub fn new<W: EvaluationWorkbook>(workbook: &'w W) -> Self {
        Self::with_config(workbook, EvaluatorConfig::default())
    }

    pub fn with_config<W: EvaluationWorkbook>(workbook: &'w W, config: EvaluatorConfig) -> Self {
        WorkbookEvaluator {
            workbook,
            tracker: EvaluationTracker::new(config.max_depth),
            config,
            cache: RefCell::new(EvaluationCache::default()),
            sheet_indexes: RefCell::new(HashMap::new()),
            listener: None,
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn EvaluationListener + 'w>) {
        self.listener = Some(listener);
    }

    pub fn workbook(&self) -> &'w dyn EvaluationWorkbook {
        self.workbook
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn stats(&self) -> EvaluationStats {
        self.cache.borrow().stats()
    }

    /// Number of formula results currently cached.
    pub fn cached_value_count(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Resolve a sheet name (case-insensitive). Lookups are memoized until
    /// the next [`invalidate_values`](Self::invalidate_values).
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        let key = name.to_lowercase();
        if let Some(index) = self.sheet_indexes.borrow().get(&key) {
            return *index;
        }
        let index = self.workbook.sheet_index(name);
        self.sheet_indexes.borrow_mut().insert(key, index);
        index
    }

    pub fn sheet_name(&self, sheet_index: usize) -> Option<&'w str> {
        self.workbook.sheet_name(sheet_index)
    }

    pub fn sheet_evaluator(&self, sheet_index: usize) -> Result<SheetRefEvaluator<'_, 'w>> {
        SheetRefEvaluator::new(self, sheet_index)
    }

    pub fn range_evaluator(&self, sheets: SheetIndexRange) -> Result<SheetRangeEvaluator<'_, 'w>> {
        SheetRangeEvaluator::new(self, sheets)
    }

    /// Value of one cell. Formula results are dereferenced to a single value
    /// and a blank result reads as zero.
    pub fn evaluate(&self, coord: CellCoordinate) -> Result<ValueEval> {
        self.sheet_evaluator(coord.sheet_index)?
            .eval_cell(coord.row, coord.col)
    }

    pub fn evaluate_cell(&self, sheet_name: &str, row: usize, col: usize) -> Result<ValueEval> {
        let sheet_index = self
            .sheet_index(sheet_name)
            .ok_or_else(|| EvalError::SheetNotFound(sheet_name.to_string()))?;
        self.evaluate(CellCoordinate::new(sheet_index, row, col))
    }

    /// Run a token program as if it were stored in `target`, without shifting
    /// its references. The result is a single value; blank is preserved.
    pub fn evaluate_formula(&self, formula: &Formula, target: CellCoordinate) -> Result<ValueEval> {
        self.sheet_evaluator(target.sheet_index)?;
        let ctx = OperationEvaluationContext::new(self, target.sheet_index, target.row, target.col);
        let result = ctx.run(formula)?;
        ctx.single_value(result)
    }

    /// Run a program written for `anchor` at `target`: relative references
    /// are moved by `target - anchor` first.
    pub fn evaluate_relative(
        &self,
        formula: &Formula,
        target: CellCoordinate,
        anchor: CellRef,
    ) -> Result<ValueEval> {
        let delta_row = target.row as isize - anchor.row as isize;
        let delta_col = target.col as isize - anchor.col as isize;
        self.evaluate_formula(&formula.shifted(delta_row, delta_col), target)
    }

    /// Drop all cached results. Call after any cell value changes.
    pub fn invalidate_values(&self) {
        let cleared = self.cache.borrow_mut().clear();
        self.sheet_indexes.borrow_mut().clear();
        debug!("cleared {} cached cell values", cleared);
    }

    pub fn clear_all_cached_result_values(&self) {
        self.invalidate_values();
    }

    pub(crate) fn evaluate_cell_on(
        &self,
        sheet: &dyn EvaluationSheet,
        coord: CellCoordinate,
    ) -> Result<ValueEval> {
        let formula = match sheet.cell(coord.row, coord.col) {
            None => {
                self.cache.borrow_mut().record_plain_read();
                return Ok(ValueEval::Blank);
            }
            Some(cell) => match cell.literal_value() {
                Some(value) => {
                    self.cache.borrow_mut().record_plain_read();
                    return Ok(value);
                }
                None => match cell.formula() {
                    Some(formula) => formula.clone(),
                    None => return Ok(ValueEval::Blank),
                },
            },
        };

        if self.config.cache_formula_results {
            let cached = self.cache.borrow_mut().get(&coord);
            if let Some(value) = cached {
                trace!("cache hit for {}: {}", coord, value);
                if let Some(listener) = &self.listener {
                    listener.on_cache_hit(coord, &value);
                }
                return Ok(value);
            }
        }

        let Some(guard) = self.tracker.start_evaluate(coord)? else {
            debug!("circular reference at {}", coord);
            return Ok(ValueEval::Error(ErrorCode::CircularRef));
        };
        if let Some(listener) = &self.listener {
            listener.on_start_evaluate(coord);
        }
        trace!("evaluating {} at depth {}", coord, self.tracker.depth());
        self.cache.borrow_mut().record_formula_evaluation();

        let ctx = OperationEvaluationContext::new(self, coord.sheet_index, coord.row, coord.col);
        let value = ctx.run(&formula)?;
        let result = match ctx.single_value(value)? {
            ValueEval::Blank => ValueEval::Number(0.0),
            other => other,
        };

        let top_frame = guard.is_top_frame();
        drop(guard);

        // A circular result below the top frame depends on where the cycle
        // was entered, so only the top frame keeps it.
        let cacheable = top_frame || result != ValueEval::Error(ErrorCode::CircularRef);
        if self.config.cache_formula_results && cacheable {
            debug!("caching {} = {}", coord, result);
            self.cache.borrow_mut().insert(coord, result.clone());
        }
        if let Some(listener) = &self.listener {
            listener.on_end_evaluate(coord, &result);
        }
        Ok(result)
    }
}

impl CellSource for WorkbookEvaluator<'_> {
    fn cell_value(&self, sheet_index: usize, row: usize, col: usize) -> Result<ValueEval> {
        self.sheet_evaluator(sheet_index)?.eval_cell(row, col)
    }
}

/// State of one token program run: the evaluator and the cell the program
/// is evaluated for.
pub struct OperationEvaluationContext<'e, 'w> {
    evaluator: &'e WorkbookEvaluator<'w>,
    sheet_index: usize,
    row: usize,
    col: usize,
}

impl<'e, 'w> OperationEvaluationContext<'e, 'w> {
    pub(crate) fn new(
        evaluator: &'e WorkbookEvaluator<'w>,
        sheet_index: usize,
        row: usize,
        col: usize,
    ) -> Self {
        OperationEvaluationContext {
            evaluator,
            sheet_index,
            row,
            col,
        }
    }

    pub fn evaluator(&self) -> &'e WorkbookEvaluator<'w> {
        self.evaluator
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet_index
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.col
    }

    pub fn sheet_evaluator(&self, sheet_index: usize) -> Result<SheetRefEvaluator<'e, 'w>> {
        SheetRefEvaluator::new(self.evaluator, sheet_index)
    }

    pub fn range_evaluator(&self, sheets: SheetIndexRange) -> Result<SheetRangeEvaluator<'e, 'w>> {
        SheetRangeEvaluator::new(self.evaluator, sheets)
    }

    /// Dereference to a single value (implicit intersection for areas).
    pub fn single_value(&self, value: ValueEval) -> Result<ValueEval> {
        operators::single_value(self, value)
    }

    /// Resolve a sheet qualifier. None when any name is unknown.
    pub fn resolve_sheets(&self, span: &SheetSpan) -> Option<SheetIndexRange> {
        let first = self.evaluator.sheet_index(&span.first)?;
        let last = match &span.last {
            Some(last) => self.evaluator.sheet_index(last)?,
            None => first,
        };
        Some(SheetIndexRange::new(first, last))
    }

    /// Execute a token program. The result may still be a reference.
    pub fn run(&self, formula: &Formula) -> Result<ValueEval> {
        let mut stack: Vec<ValueEval> = Vec::with_capacity(formula.len());
        for token in formula.tokens() {
            let value = match token {
                Token::Number(n) => ValueEval::Number(*n),
                Token::Text(s) => ValueEval::Text(s.clone()),
                Token::Boolean(b) => ValueEval::Boolean(*b),
                Token::Error(code) => ValueEval::Error(*code),
                Token::Missing => ValueEval::Blank,
                Token::Ref(address) => ValueEval::Ref(RefEval::new(
                    SheetIndexRange::single(self.sheet_index),
                    address.row,
                    address.col,
                )),
                Token::Area(area) => ValueEval::Area(AreaEval::sheet_backed(
                    SheetIndexRange::single(self.sheet_index),
                    area.range(),
                )),
                Token::Ref3d { sheets, address } => match self.resolve_sheets(sheets) {
                    Some(sheets) => ValueEval::Ref(RefEval::new(sheets, address.row, address.col)),
                    None => ValueEval::Error(ErrorCode::RefInvalid),
                },
                Token::Area3d { sheets, area } => match self.resolve_sheets(sheets) {
                    Some(sheets) => ValueEval::Area(AreaEval::sheet_backed(sheets, area.range())),
                    None => ValueEval::Error(ErrorCode::RefInvalid),
                },
                Token::RefError => ValueEval::Error(ErrorCode::RefInvalid),
                Token::Array { rows, cols, values } => {
                    if *rows == 0 || *cols == 0 {
                        return Err(EvalError::MalformedProgram("empty array constant".to_string()));
                    }
                    let bounds = CellRangeAddress::new(0, 0, rows - 1, cols - 1);
                    let area = AreaEval::materialized(bounds, values.clone())
                        .map_err(|e| EvalError::MalformedProgram(e.to_string()))?;
                    ValueEval::Area(area)
                }
                Token::Name(name) => self.evaluate_name(name)?,
                Token::Binary(op) => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    operators::binary(self, *op, lhs, rhs)?
                }
                Token::Unary(op) => {
                    let operand = pop(&mut stack)?;
                    operators::unary(self, *op, operand)?
                }
                Token::Func { name, argc } => {
                    if *argc > stack.len() {
                        return Err(EvalError::MalformedProgram(format!(
                            "{} expects {} arguments but only {} are on the stack",
                            name,
                            argc,
                            stack.len()
                        )));
                    }
                    let args = stack.split_off(stack.len() - argc);
                    builtins::invoke(self, name, &args)?
                }
            };
            stack.push(value);
        }
        match (stack.pop(), stack.is_empty()) {
            (Some(value), true) => Ok(value),
            (None, _) => Err(EvalError::MalformedProgram("empty token program".to_string())),
            (Some(_), false) => Err(EvalError::MalformedProgram(format!(
                "{} values left on the stack",
                stack.len() + 1
            ))),
        }
    }

    fn evaluate_name(&self, name: &str) -> Result<ValueEval> {
        let Some(formula) = self
            .evaluator
            .workbook()
            .defined_name(name, self.sheet_index)
        else {
            return Ok(ValueEval::Error(ErrorCode::NameInvalid));
        };
        let _guard = self.evaluator.tracker.enter_name()?;
        self.run(&formula)
    }
}

impl CellSource for OperationEvaluationContext<'_, '_> {
    fn cell_value(&self, sheet_index: usize, row: usize, col: usize) -> Result<ValueEval> {
        self.evaluator.cell_value(sheet_index, row, col)
    }
}

fn pop(stack: &mut Vec<ValueEval>) -> Result<ValueEval> {
    stack
        .pop()
        .ok_or_else(|| EvalError::MalformedProgram("operator is missing an operand".to_string()))
}
