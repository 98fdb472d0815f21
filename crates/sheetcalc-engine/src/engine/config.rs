use serde::{Deserialize, Serialize};

/// Default bound on nested evaluations (formula cells plus defined names).
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Evaluator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Deepest chain of nested evaluations before `RecursionLimit` is raised.
    pub max_depth: usize,
    /// Keep computed formula results until values are invalidated.
    pub cache_formula_results: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            cache_formula_results: true,
        }
    }
}
