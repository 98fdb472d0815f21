//! Cell-value cache and evaluation counters.

use std::collections::HashMap;

use super::cell_ref::CellCoordinate;
use super::value::ValueEval;

/// Work counters, cumulative since the evaluator was created.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EvaluationStats {
    /// Formula cells whose token program was executed.
    pub formula_evaluations: u64,
    /// Formula cells answered from the cache.
    pub cache_hits: u64,
    /// Literal or empty cells read directly.
    pub plain_reads: u64,
}

/// Hooks invoked around cell evaluation.
pub trait EvaluationListener {
    fn on_start_evaluate(&self, _coord: CellCoordinate) {}

    fn on_end_evaluate(&self, _coord: CellCoordinate, _result: &ValueEval) {}

    fn on_cache_hit(&self, _coord: CellCoordinate, _result: &ValueEval) {}
}

#[derive(Debug, Default)]
pub(crate) struct EvaluationCache {
    values: HashMap<CellCoordinate, ValueEval>,
    stats: EvaluationStats,
}

impl EvaluationCache {
    pub(crate) fn get(&mut self, coord: &CellCoordinate) -> Option<ValueEval> {
        let value = self.values.get(coord).cloned();
        if value.is_some() {
            self.stats.cache_hits += 1;
        }
        value
    }

    pub(crate) fn insert(&mut self, coord: CellCoordinate, value: ValueEval) {
        self.values.insert(coord, value);
    }

    pub(crate) fn clear(&mut self) -> usize {
        let cleared = self.values.len();
        self.values.clear();
        cleared
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn record_formula_evaluation(&mut self) {
        self.stats.formula_evaluations += 1;
    }

    pub(crate) fn record_plain_read(&mut self) {
        self.stats.plain_reads += 1;
    }

    pub(crate) fn stats(&self) -> EvaluationStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_are_counted() {
        let mut cache = EvaluationCache::default();
        let coord = CellCoordinate::new(0, 1, 1);
        assert_eq!(cache.get(&coord), None);
        cache.insert(coord, ValueEval::Number(3.0));
        assert_eq!(cache.get(&coord), Some(ValueEval::Number(3.0)));
        assert_eq!(cache.stats().cache_hits, 1);
        assert_eq!(cache.clear(), 1);
        assert_eq!(cache.len(), 0);
    }
}
