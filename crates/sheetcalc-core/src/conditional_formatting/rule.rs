//! Declared conditional formats and their resolved, sortable form.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use sheetcalc_engine::engine::{CellRangeAddress, CellRef, Formula};

use super::filter::FilterCondition;
use super::operator::ComparisonOperator;

/// What a rule tests.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Compare the cell's value against one or two operand formulas.
    CellValueIs {
        operator: ComparisonOperator,
        formula1: Formula,
        formula2: Option<Formula>,
    },
    /// Truthiness of a formula evaluated relative to the cell.
    Formula(Formula),
    Filter(FilterCondition),
    ColorScale,
    DataBar,
    IconSet,
}

impl Condition {
    pub fn cell_value(operator: ComparisonOperator, formula1: Formula, formula2: Option<Formula>) -> Self {
        Condition::CellValueIs {
            operator,
            formula1,
            formula2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConditionalFormattingRule {
    /// Sheet-wide priority, lower first. Absent sorts as 0.
    pub priority: Option<u32>,
    pub stop_if_true: bool,
    pub condition: Condition,
}

impl ConditionalFormattingRule {
    pub fn new(condition: Condition) -> Self {
        ConditionalFormattingRule {
            priority: None,
            stop_if_true: false,
            condition,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_stop_if_true(mut self, stop_if_true: bool) -> Self {
        self.stop_if_true = stop_if_true;
        self
    }
}

/// A group of rules sharing the regions they apply to.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionalFormatting {
    pub regions: Vec<CellRangeAddress>,
    pub rules: Vec<ConditionalFormattingRule>,
}

impl ConditionalFormatting {
    pub fn new(regions: Vec<CellRangeAddress>, rules: Vec<ConditionalFormattingRule>) -> Self {
        ConditionalFormatting { regions, rules }
    }
}

/// Identity of a rule: sheet name (case-insensitive), formatting index and
/// rule index within the formatting.
#[derive(Clone, Debug)]
pub struct RuleId {
    pub sheet_name: String,
    pub formatting_index: usize,
    pub rule_index: usize,
}

impl RuleId {
    pub fn new(sheet_name: impl Into<String>, formatting_index: usize, rule_index: usize) -> Self {
        RuleId {
            sheet_name: sheet_name.into(),
            formatting_index,
            rule_index,
        }
    }
}

impl PartialEq for RuleId {
    fn eq(&self, other: &Self) -> bool {
        self.formatting_index == other.formatting_index
            && self.rule_index == other.rule_index
            && self.sheet_name.eq_ignore_ascii_case(&other.sheet_name)
    }
}

impl Eq for RuleId {}

impl Hash for RuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sheet_name.to_ascii_lowercase().hash(state);
        self.formatting_index.hash(state);
        self.rule_index.hash(state);
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}:{}]",
            self.sheet_name, self.formatting_index, self.rule_index
        )
    }
}

/// A declared rule bound to its sheet, formatting and regions.
#[derive(Clone, Debug)]
pub struct EvaluationRule {
    id: RuleId,
    sheet_index: usize,
    regions: Vec<CellRangeAddress>,
    anchor: CellRef,
    rule: ConditionalFormattingRule,
}

impl EvaluationRule {
    pub fn new(
        sheet_index: usize,
        id: RuleId,
        regions: Vec<CellRangeAddress>,
        rule: ConditionalFormattingRule,
    ) -> Self {
        let anchor = anchor_region(&regions)
            .map(|region| region.top_left())
            .unwrap_or(CellRef::new(0, 0));
        EvaluationRule {
            id,
            sheet_index,
            regions,
            anchor,
            rule,
        }
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet_index
    }

    pub fn sheet_name(&self) -> &str {
        &self.id.sheet_name
    }

    pub fn formatting_index(&self) -> usize {
        self.id.formatting_index
    }

    pub fn rule_index(&self) -> usize {
        self.id.rule_index
    }

    pub fn regions(&self) -> &[CellRangeAddress] {
        &self.regions
    }

    /// Cell the rule's relative formulas are written against.
    pub fn anchor(&self) -> CellRef {
        self.anchor
    }

    pub fn priority(&self) -> u32 {
        self.rule.priority.unwrap_or(0)
    }

    pub fn stop_if_true(&self) -> bool {
        self.rule.stop_if_true
    }

    pub fn condition(&self) -> &Condition {
        &self.rule.condition
    }

    pub fn rule(&self) -> &ConditionalFormattingRule {
        &self.rule
    }

    pub fn region_containing(&self, row: usize, col: usize) -> Option<&CellRangeAddress> {
        self.regions.iter().find(|region| region.contains(row, col))
    }
}

impl PartialEq for EvaluationRule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EvaluationRule {}

impl Ord for EvaluationRule {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .sheet_name
            .to_ascii_lowercase()
            .cmp(&other.id.sheet_name.to_ascii_lowercase())
            .then_with(|| self.priority().cmp(&other.priority()))
            .then_with(|| self.id.formatting_index.cmp(&other.id.formatting_index))
            .then_with(|| self.id.rule_index.cmp(&other.id.rule_index))
    }
}

impl PartialOrd for EvaluationRule {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// First region, replaced by any later one lying further left or further up.
fn anchor_region(regions: &[CellRangeAddress]) -> Option<&CellRangeAddress> {
    let mut regions = regions.iter();
    let mut anchor = regions.next()?;
    for region in regions {
        if region.first_col < anchor.first_col || region.first_row < anchor.first_row {
            anchor = region;
        }
    }
    Some(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(priority: Option<u32>) -> ConditionalFormattingRule {
        ConditionalFormattingRule {
            priority,
            stop_if_true: false,
            condition: Condition::DataBar,
        }
    }

    #[test]
    fn test_anchor_is_top_left_region() {
        let regions = vec![
            CellRangeAddress::parse("C3:D4").unwrap(),
            CellRangeAddress::parse("B5:B9").unwrap(),
        ];
        let evaluation = EvaluationRule::new(0, RuleId::new("Sheet1", 0, 0), regions, rule(None));
        assert_eq!(evaluation.anchor(), CellRef::new(1, 4));
    }

    #[test]
    fn test_identity_ignores_sheet_case() {
        let a = RuleId::new("Sheet1", 1, 2);
        let b = RuleId::new("SHEET1", 1, 2);
        assert_eq!(a, b);
        assert_ne!(a, RuleId::new("Sheet1", 1, 3));
    }

    #[test]
    fn test_sort_order() {
        let region = vec![CellRangeAddress::single(0, 0)];
        let mut rules = vec![
            EvaluationRule::new(0, RuleId::new("a", 1, 0), region.clone(), rule(Some(1))),
            EvaluationRule::new(0, RuleId::new("a", 0, 1), region.clone(), rule(None)),
            EvaluationRule::new(0, RuleId::new("a", 0, 0), region.clone(), rule(Some(1))),
            EvaluationRule::new(0, RuleId::new("a", 2, 0), region, rule(Some(0))),
        ];
        rules.sort();
        let order: Vec<(usize, usize)> = rules
            .iter()
            .map(|r| (r.formatting_index(), r.rule_index()))
            .collect();
        assert_eq!(order, vec![(0, 1), (2, 0), (0, 0), (1, 0)]);
    }
}
