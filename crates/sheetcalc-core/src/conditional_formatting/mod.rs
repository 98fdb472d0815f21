//! Conditional formatting: declared rules and the evaluator that decides
//! which of them apply to a cell.

mod evaluator;
mod filter;
mod operator;
mod rule;

pub use evaluator::{ConditionalFormattingEvaluator, RuleList};
pub use filter::{AverageFilter, FilterCondition};
pub use operator::{Comparable, ComparisonOperator};
pub use rule::{Condition, ConditionalFormatting, ConditionalFormattingRule, EvaluationRule, RuleId};

use sheetcalc_engine::engine::EvaluationWorkbook;

/// A workbook that also declares conditional formats per sheet.
pub trait ConditionalFormattingSource: EvaluationWorkbook {
    /// Formattings of a sheet in declaration order.
    fn conditional_formattings(&self, sheet_index: usize) -> Vec<ConditionalFormatting>;
}
