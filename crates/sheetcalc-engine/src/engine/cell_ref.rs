//! Cell and range addressing.
//!
//! Provides bidirectional conversion between spreadsheet-style references
//! (e.g., "A1", "$B$2", "AA100", "A1:C5") and zero-indexed row/column
//! coordinates, plus the identity keys used by the evaluation caches.
//!
//! # Examples
//!
//! ```ignore
//! let cell = CellRef::from_str("B3").unwrap();
//! assert_eq!(cell.col, 1);  // 0-indexed
//! assert_eq!(cell.row, 2);
//! assert_eq!(cell.to_string(), "B3");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Number of rows in a worksheet grid.
pub const MAX_ROWS: usize = 1_048_576;
/// Number of columns in a worksheet grid.
pub const MAX_COLUMNS: usize = 16_384;

fn a1_re() -> &'static Regex {
    static A1_RE: OnceLock<Regex> = OnceLock::new();
    A1_RE.get_or_init(|| {
        Regex::new(r"^(?<col_abs>\$?)(?<letters>[A-Za-z]+)(?<row_abs>\$?)(?<numbers>[0-9]+)$")
            .expect("A1 reference regex must compile")
    })
}

fn letters_to_col(letters: &str) -> Option<usize> {
    let mut col_acc = 0usize;
    for c in letters.to_ascii_uppercase().bytes() {
        let digit = (c - b'A') as usize + 1;
        col_acc = col_acc.checked_mul(26)?.checked_add(digit)?;
    }
    col_acc.checked_sub(1)
}

/// A reference to a cell by column and row indices (0-indexed).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(col: usize, row: usize) -> CellRef {
        CellRef { row, col }
    }

    /// Parse a cell reference from spreadsheet notation (e.g., "A1", "B2", "AA10").
    /// Absolute markers (`$`) are accepted and ignored.
    /// Returns None if the input is invalid.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<CellRef> {
        CellAddress::parse(name).map(|addr| addr.cell())
    }

    /// Convert column index to spreadsheet-style letters (0 -> A, 25 -> Z, 26 -> AA).
    pub fn col_to_letters(col: usize) -> String {
        let mut result = String::new();
        let mut n = col as u128 + 1;
        while n > 0 {
            n -= 1;
            result.insert(0, (b'A' + (n % 26) as u8) as char);
            n /= 26;
        }
        result
    }
}

impl std::str::FromStr for CellRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellRef::from_str(s).ok_or_else(|| format!("Invalid cell reference: {}", s))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CellRef::col_to_letters(self.col), self.row + 1)
    }
}

/// A cell address as it appears inside a token program: a position plus
/// whether each component is relative (moves when the formula is shifted)
/// or absolute (`$`).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
    pub row_relative: bool,
    pub col_relative: bool,
}

impl CellAddress {
    /// A fully relative address (`A1` style).
    pub fn relative(row: usize, col: usize) -> CellAddress {
        CellAddress {
            row,
            col,
            row_relative: true,
            col_relative: true,
        }
    }

    /// A fully absolute address (`$A$1` style).
    pub fn absolute(row: usize, col: usize) -> CellAddress {
        CellAddress {
            row,
            col,
            row_relative: false,
            col_relative: false,
        }
    }

    /// Parse `A1`, `$A1`, `A$1` or `$A$1`.
    pub fn parse(text: &str) -> Option<CellAddress> {
        let caps = a1_re().captures(text.trim())?;
        let col = letters_to_col(&caps["letters"])?;
        let row = caps["numbers"].parse::<usize>().ok()?.checked_sub(1)?;
        if row >= MAX_ROWS || col >= MAX_COLUMNS {
            return None;
        }
        Some(CellAddress {
            row,
            col,
            row_relative: caps["row_abs"].is_empty(),
            col_relative: caps["col_abs"].is_empty(),
        })
    }

    pub fn cell(&self) -> CellRef {
        CellRef::new(self.col, self.row)
    }

    /// Move the relative components by the given deltas.
    /// Returns None when the result leaves the grid.
    pub fn shifted(&self, delta_row: isize, delta_col: isize) -> Option<CellAddress> {
        let row = if self.row_relative {
            shift_index(self.row, delta_row, MAX_ROWS)?
        } else {
            self.row
        };
        let col = if self.col_relative {
            shift_index(self.col, delta_col, MAX_COLUMNS)?
        } else {
            self.col
        };
        Some(CellAddress { row, col, ..*self })
    }
}

fn shift_index(index: usize, delta: isize, limit: usize) -> Option<usize> {
    let shifted = index.checked_add_signed(delta)?;
    (shifted < limit).then_some(shifted)
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let col_abs = if self.col_relative { "" } else { "$" };
        let row_abs = if self.row_relative { "" } else { "$" };
        write!(
            f,
            "{}{}{}{}",
            col_abs,
            CellRef::col_to_letters(self.col),
            row_abs,
            self.row + 1
        )
    }
}

/// A rectangular block of cells, stored normalized (first <= last).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellRangeAddress {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl CellRangeAddress {
    pub fn new(first_row: usize, first_col: usize, last_row: usize, last_col: usize) -> Self {
        CellRangeAddress {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        }
    }

    pub fn single(row: usize, col: usize) -> Self {
        CellRangeAddress::new(row, col, row, col)
    }

    /// Parse a range like "A1:B5" (a lone "A1" is a 1x1 range).
    pub fn parse(range: &str) -> Option<CellRangeAddress> {
        let mut parts = range.split(':');
        let start = CellRef::from_str(parts.next()?)?;
        let end = match parts.next() {
            Some(end) => CellRef::from_str(end)?,
            None => start,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(CellRangeAddress::new(start.row, start.col, end.row, end.col))
    }

    pub fn width(&self) -> usize {
        self.last_col - self.first_col + 1
    }

    pub fn height(&self) -> usize {
        self.last_row - self.first_row + 1
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.contains_row(row) && self.contains_column(col)
    }

    pub fn contains_row(&self, row: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row)
    }

    pub fn contains_column(&self, col: usize) -> bool {
        (self.first_col..=self.last_col).contains(&col)
    }

    pub fn top_left(&self) -> CellRef {
        CellRef::new(self.first_col, self.first_row)
    }

    /// Iterate every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.first_row..=self.last_row)
            .flat_map(move |row| (self.first_col..=self.last_col).map(move |col| CellRef::new(col, row)))
    }
}

impl fmt::Display for CellRangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = CellRef::new(self.first_col, self.first_row);
        let end = CellRef::new(self.last_col, self.last_row);
        write!(f, "{}:{}", start, end)
    }
}

/// Identity of one grid cell by sheet position. Key of the cell-value cache.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellCoordinate {
    pub sheet_index: usize,
    pub row: usize,
    pub col: usize,
}

impl CellCoordinate {
    pub fn new(sheet_index: usize, row: usize, col: usize) -> Self {
        CellCoordinate {
            sheet_index,
            row,
            col,
        }
    }

    pub fn cell(&self) -> CellRef {
        CellRef::new(self.col, self.row)
    }
}

impl fmt::Display for CellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]!{}", self.sheet_index, self.cell())
    }
}

/// A cell identified by sheet name, as used by the rule matching layer.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellReference {
    pub sheet_name: String,
    pub row: usize,
    pub col: usize,
}

impl CellReference {
    pub fn new(sheet_name: impl Into<String>, row: usize, col: usize) -> Self {
        CellReference {
            sheet_name: sheet_name.into(),
            row,
            col,
        }
    }

    /// Parse `Sheet1!B3` style text.
    pub fn parse(text: &str) -> Option<CellReference> {
        let (sheet, cell) = text.rsplit_once('!')?;
        let sheet = sheet.trim_matches('\'');
        let cell = CellRef::from_str(cell)?;
        Some(CellReference::new(sheet, cell.row, cell.col))
    }

    pub fn cell(&self) -> CellRef {
        CellRef::new(self.col, self.row)
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet_name, self.cell())
    }
}
