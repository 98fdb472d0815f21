//! Rule matching against evaluated cell values.
//!
//! [`ConditionalFormattingEvaluator`] owns a [`WorkbookEvaluator`] and three
//! caches: the sorted rule list of each sheet, the matching rules of each
//! cell, and region statistics used by top-N, unique/duplicate and average
//! filters. Rule lists are dropped by [`invalidate_formats`], match lists by
//! [`invalidate_values`]. Region statistics go with either.
//!
//! [`invalidate_formats`]: ConditionalFormattingEvaluator::invalidate_formats
//! [`invalidate_values`]: ConditionalFormattingEvaluator::invalidate_values

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, trace, warn};

use sheetcalc_engine::engine::{
    CellCoordinate, CellRangeAddress, CellReference, EvalError, EvaluationCell, EvaluationWorkbook,
    EvaluatorConfig, Formula, Token, ValueEval, WorkbookEvaluator,
};

use super::ConditionalFormattingSource;
use super::filter::{CellSample, FilterCondition, RegionStats};
use super::operator::{Comparable, ComparisonOperator};
use super::rule::{Condition, EvaluationRule, RuleId};
use crate::error::{CoreError, Result};

/// Rules in evaluation order.
pub type RuleList = Rc<[Rc<EvaluationRule>]>;

pub struct ConditionalFormattingEvaluator<'w> {
    workbook: &'w dyn ConditionalFormattingSource,
    evaluator: WorkbookEvaluator<'w>,
    rules_by_sheet: RefCell<HashMap<usize, RuleList>>,
    values_by_cell: RefCell<HashMap<CellCoordinate, RuleList>>,
    region_stats: RefCell<HashMap<(RuleId, CellRangeAddress), Rc<RegionStats>>>,
}

impl<'w> ConditionalFormattingEvaluator<'w> {
    pub fn new<W: ConditionalFormattingSource>(workbook: &'w W) -> Self {
        Self::with_config(workbook, EvaluatorConfig::default())
    }

    pub fn with_config<W: ConditionalFormattingSource>(workbook: &'w W, config: EvaluatorConfig) -> Self {
        ConditionalFormattingEvaluator {
            workbook,
            evaluator: WorkbookEvaluator::with_config(workbook, config),
            rules_by_sheet: RefCell::new(HashMap::new()),
            values_by_cell: RefCell::new(HashMap::new()),
            region_stats: RefCell::new(HashMap::new()),
        }
    }

    pub fn evaluator(&self) -> &WorkbookEvaluator<'w> {
        &self.evaluator
    }

    /// Rules of a sheet sorted by priority, then formatting and rule index.
    pub fn rules_for_sheet(&self, sheet_name: &str) -> Result<RuleList> {
        let sheet_index = self.sheet_index(sheet_name)?;
        self.rules_for_sheet_index(sheet_index)
    }

    pub fn rules_for_sheet_index(&self, sheet_index: usize) -> Result<RuleList> {
        if let Some(rules) = self.rules_by_sheet.borrow().get(&sheet_index) {
            return Ok(Rc::clone(rules));
        }
        let sheet_name = self
            .workbook
            .sheet_name(sheet_index)
            .ok_or(EvalError::SheetIndexOutOfRange(sheet_index))?;

        let mut rules = Vec::new();
        for (formatting_index, formatting) in self
            .workbook
            .conditional_formattings(sheet_index)
            .into_iter()
            .enumerate()
        {
            for (rule_index, rule) in formatting.rules.into_iter().enumerate() {
                rules.push(EvaluationRule::new(
                    sheet_index,
                    RuleId::new(sheet_name, formatting_index, rule_index),
                    formatting.regions.clone(),
                    rule,
                ));
            }
        }
        rules.sort();
        rules.dedup();
        debug!("built {} conditional format rules for sheet {}", rules.len(), sheet_name);

        let rules: RuleList = rules.into_iter().map(Rc::new).collect();
        self.rules_by_sheet
            .borrow_mut()
            .insert(sheet_index, Rc::clone(&rules));
        Ok(rules)
    }

    /// Rules that apply to a cell, in order, up to and including the first
    /// matching rule that stops further evaluation.
    pub fn rules_matching_cell(&self, cell: &CellReference) -> Result<RuleList> {
        let coord = CellCoordinate::new(self.sheet_index(&cell.sheet_name)?, cell.row, cell.col);
        self.rules_matching(coord)
    }

    fn rules_matching(&self, coord: CellCoordinate) -> Result<RuleList> {
        if let Some(rules) = self.values_by_cell.borrow().get(&coord) {
            return Ok(Rc::clone(rules));
        }
        let mut matched = Vec::new();
        for rule in self.rules_for_sheet_index(coord.sheet_index)?.iter() {
            if self.matches(rule, coord)? {
                trace!("rule {} matches {}", rule.id(), coord);
                matched.push(Rc::clone(rule));
                if rule.stop_if_true() {
                    break;
                }
            }
        }
        let matched: RuleList = matched.into();
        self.values_by_cell
            .borrow_mut()
            .insert(coord, Rc::clone(&matched));
        Ok(matched)
    }

    /// Call after rules are added, removed, reordered or edited.
    pub fn invalidate_formats(&self) {
        let sheets = self.rules_by_sheet.borrow().len();
        self.rules_by_sheet.borrow_mut().clear();
        self.region_stats.borrow_mut().clear();
        debug!("cleared conditional format rules of {} sheets", sheets);
    }

    /// Call after any cell value changes. Also clears the evaluator's
    /// cell-value cache.
    pub fn invalidate_values(&self) {
        let cells = self.values_by_cell.borrow().len();
        self.values_by_cell.borrow_mut().clear();
        self.region_stats.borrow_mut().clear();
        self.evaluator.invalidate_values();
        debug!("cleared conditional format matches of {} cells", cells);
    }

    pub fn rule(&self, sheet_name: &str, formatting_index: usize, rule_index: usize) -> Result<Rc<EvaluationRule>> {
        let id = RuleId::new(sheet_name, formatting_index, rule_index);
        self.rules_for_sheet(sheet_name)?
            .iter()
            .find(|rule| *rule.id() == id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownRule {
                sheet: sheet_name.to_string(),
                formatting_index,
                rule_index,
            })
    }

    /// Every cell in the rule's regions that the rule applies to. Scans
    /// the full area of each region.
    pub fn matching_cells(&self, rule: &EvaluationRule) -> Result<Vec<CellReference>> {
        let mut seen = HashSet::new();
        let mut cells = Vec::new();
        for region in rule.regions() {
            for cell in region.cells() {
                if !seen.insert(cell) {
                    continue;
                }
                let coord = CellCoordinate::new(rule.sheet_index(), cell.row, cell.col);
                if self.rules_matching(coord)?.iter().any(|m| m.id() == rule.id()) {
                    cells.push(CellReference::new(rule.sheet_name(), cell.row, cell.col));
                }
            }
        }
        Ok(cells)
    }

    pub fn matching_cells_for(
        &self,
        sheet_name: &str,
        formatting_index: usize,
        rule_index: usize,
    ) -> Result<Vec<CellReference>> {
        let rule = self.rule(sheet_name, formatting_index, rule_index)?;
        self.matching_cells(&rule)
    }

    fn sheet_index(&self, sheet_name: &str) -> Result<usize> {
        self.evaluator
            .sheet_index(sheet_name)
            .ok_or_else(|| CoreError::UnknownSheet(sheet_name.to_string()))
    }

    fn stored_cell(&self, coord: CellCoordinate) -> Option<EvaluationCell> {
        self.workbook
            .sheet(coord.sheet_index)?
            .cell(coord.row, coord.col)
    }

    fn matches(&self, rule: &EvaluationRule, coord: CellCoordinate) -> Result<bool> {
        let Some(region) = rule.region_containing(coord.row, coord.col).copied() else {
            return Ok(false);
        };
        match rule.condition() {
            Condition::ColorScale | Condition::DataBar | Condition::IconSet => Ok(true),
            Condition::CellValueIs {
                operator,
                formula1,
                formula2,
            } => {
                if self.stored_cell(coord).is_none() {
                    return Ok(false);
                }
                self.check_value(rule, coord, *operator, formula1, formula2.as_ref())
            }
            Condition::Formula(formula) => self.check_formula(rule, coord, formula),
            Condition::Filter(FilterCondition::TimePeriod(formula)) => {
                self.check_formula(rule, coord, formula)
            }
            Condition::Filter(filter) => self.check_filter(rule, coord, region, filter),
        }
    }

    /// Evaluate a rule formula at `coord`, moving its relative references
    /// from the rule's anchor once.
    fn rule_formula(&self, rule: &EvaluationRule, coord: CellCoordinate, formula: &Formula) -> Result<ValueEval> {
        let anchor = rule.anchor();
        let delta_row = coord.row as isize - anchor.row as isize;
        let delta_col = coord.col as isize - anchor.col as isize;
        let shifted = formula.shifted(delta_row, delta_col);
        if ref_errors(&shifted) > ref_errors(formula) {
            warn!("rule {} references cells off the grid at {}", rule.id(), coord);
        }
        Ok(self.evaluator.evaluate_formula(&shifted, coord)?)
    }

    fn check_value(
        &self,
        rule: &EvaluationRule,
        coord: CellCoordinate,
        operator: ComparisonOperator,
        formula1: &Formula,
        formula2: Option<&Formula>,
    ) -> Result<bool> {
        let cell = match self.evaluator.evaluate(coord)? {
            ValueEval::Number(n) => Comparable::Number(n),
            ValueEval::Text(s) if !s.is_empty() => Comparable::Text(s),
            ValueEval::Boolean(b) => Comparable::Boolean(b),
            _ => return Ok(false),
        };
        let first = self.rule_formula(rule, coord, formula1)?;
        let second = match formula2 {
            Some(formula) => self.rule_formula(rule, coord, formula)?,
            None => ValueEval::Blank,
        };
        match (operand_like(&cell, first), operand_like(&cell, second)) {
            (Some(v1), Some(v2)) => Ok(operator.is_valid(&cell, v1.as_ref(), v2.as_ref())),
            _ => Ok(operator.is_valid_for_incompatible_types()),
        }
    }

    fn check_formula(&self, rule: &EvaluationRule, coord: CellCoordinate, formula: &Formula) -> Result<bool> {
        let matched = match self.rule_formula(rule, coord, formula)? {
            ValueEval::Blank => true,
            ValueEval::Boolean(b) => b,
            ValueEval::Number(n) => n != 0.0,
            _ => false,
        };
        Ok(matched)
    }

    fn check_filter(
        &self,
        rule: &EvaluationRule,
        coord: CellCoordinate,
        region: CellRangeAddress,
        filter: &FilterCondition,
    ) -> Result<bool> {
        let value = self.evaluator.evaluate(coord)?;
        let sample = CellSample::from_value(&value);
        let stats = if filter.uses_region_stats() {
            Some(self.region_stats(rule, region, filter)?)
        } else {
            None
        };
        Ok(filter.matches(&sample, value.is_error(), stats.as_deref()))
    }

    fn region_stats(
        &self,
        rule: &EvaluationRule,
        region: CellRangeAddress,
        filter: &FilterCondition,
    ) -> Result<Rc<RegionStats>> {
        let key = (rule.id().clone(), region);
        if let Some(stats) = self.region_stats.borrow().get(&key) {
            return Ok(Rc::clone(stats));
        }
        let sheet_index = rule.sheet_index();
        let sheet = self
            .workbook
            .sheet(sheet_index)
            .ok_or(EvalError::SheetIndexOutOfRange(sheet_index))?;
        let mut samples = Vec::new();
        if let Some(last_row) = sheet.last_row_num() {
            for row in region.first_row..=region.last_row.min(last_row) {
                for col in region.first_col..=region.last_col {
                    if sheet.cell(row, col).is_none() {
                        continue;
                    }
                    let value = self
                        .evaluator
                        .evaluate(CellCoordinate::new(sheet_index, row, col))?;
                    samples.push(CellSample::from_value(&value));
                }
            }
        }
        let stats = Rc::new(filter.region_stats(samples));
        debug!("computed region statistics for rule {} over {}", rule.id(), region);
        self.region_stats.borrow_mut().insert(key, Rc::clone(&stats));
        Ok(stats)
    }
}

/// An operand of the cell's kind. `Some(None)` is a blank operand, `None`
/// an incompatible one.
fn operand_like(cell: &Comparable, operand: ValueEval) -> Option<Option<Comparable>> {
    match (cell, operand) {
        (_, ValueEval::Blank) => Some(None),
        (Comparable::Number(_), ValueEval::Number(n)) => Some(Some(Comparable::Number(n))),
        (Comparable::Text(_), ValueEval::Text(s)) => Some(Some(Comparable::Text(s))),
        (Comparable::Boolean(_), ValueEval::Boolean(b)) => Some(Some(Comparable::Boolean(b))),
        _ => None,
    }
}

fn ref_errors(formula: &Formula) -> usize {
    formula
        .tokens()
        .iter()
        .filter(|token| matches!(token, Token::RefError))
        .count()
}
