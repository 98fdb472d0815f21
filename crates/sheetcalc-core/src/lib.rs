//! sheetcalc-core - Conditional formatting and an in-memory workbook model.

pub mod conditional_formatting;
pub mod config;
pub mod error;
pub mod workbook;

pub use conditional_formatting::{
    ConditionalFormatting, ConditionalFormattingEvaluator, ConditionalFormattingRule,
    ConditionalFormattingSource,
};
pub use config::{Config, load_config, parse_config};
pub use error::{CoreError, Result};
pub use workbook::{Sheet, Workbook};

pub use sheetcalc_engine::engine::{CellRef, CellReference};
