//! Comparison operators of "cell value is" rules.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    NoComparison,
    Between,
    NotBetween,
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

/// A cell value or operand, all of one kind within a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Comparable {
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl Comparable {
    fn blank_like(&self) -> Comparable {
        match self {
            Comparable::Number(_) => Comparable::Number(0.0),
            Comparable::Text(_) => Comparable::Text(String::new()),
            Comparable::Boolean(_) => Comparable::Boolean(false),
        }
    }

    fn compare(&self, other: &Comparable) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::Text(a), Comparable::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Comparable::Boolean(a), Comparable::Boolean(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl ComparisonOperator {
    /// Test `cell` against the operands. A missing operand is a blank cell.
    pub fn is_valid(&self, cell: &Comparable, v1: Option<&Comparable>, v2: Option<&Comparable>) -> bool {
        if *self == ComparisonOperator::NoComparison {
            return false;
        }
        let Some(v1) = v1 else {
            return self.is_valid_against_blank(cell, v2);
        };
        let blank = cell.blank_like();
        let v2 = v2.unwrap_or(&blank);
        let first = cell.compare(v1);
        match self {
            ComparisonOperator::NoComparison => false,
            ComparisonOperator::Between => first != Ordering::Less && cell.compare(v2) != Ordering::Greater,
            ComparisonOperator::NotBetween => first == Ordering::Less || cell.compare(v2) == Ordering::Greater,
            ComparisonOperator::Equal => first == Ordering::Equal,
            ComparisonOperator::NotEqual => first != Ordering::Equal,
            ComparisonOperator::GreaterThan => first == Ordering::Greater,
            ComparisonOperator::LessThan => first == Ordering::Less,
            ComparisonOperator::GreaterOrEqual => first != Ordering::Less,
            ComparisonOperator::LessOrEqual => first != Ordering::Greater,
        }
    }

    fn is_valid_against_blank(&self, cell: &Comparable, v2: Option<&Comparable>) -> bool {
        match cell {
            Comparable::Boolean(_) => matches!(
                self,
                ComparisonOperator::NotBetween
                    | ComparisonOperator::NotEqual
                    | ComparisonOperator::GreaterThan
                    | ComparisonOperator::GreaterOrEqual
            ),
            // An empty string never equals a blank operand.
            Comparable::Text(_) if *self == ComparisonOperator::Equal => false,
            _ if *self == ComparisonOperator::NotEqual => true,
            _ => {
                let blank = cell.blank_like();
                self.is_valid(cell, Some(&blank), v2)
            }
        }
    }

    /// Result when the cell and operand kinds differ.
    pub fn is_valid_for_incompatible_types(&self) -> bool {
        matches!(self, ComparisonOperator::NotBetween | ComparisonOperator::NotEqual)
    }
}
