//! sheetcalc_engine - Formula evaluation and result caching for spreadsheets.

pub(crate) mod builtins;
pub mod engine;

pub use builtins::{BUILTINS, Builtin, lookup as lookup_builtin};
