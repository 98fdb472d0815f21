//! TOML configuration.
//!
//! ```toml
//! [evaluator]
//! max_depth = 64
//! cache_formula_results = true
//! ```
//!
//! Any key left out keeps its default.

use std::path::Path;

use serde::Deserialize;

use sheetcalc_engine::engine::EvaluatorConfig;

use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub evaluator: EvaluatorConfig,
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str::<Config>(content)?)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_config(&content)
}
