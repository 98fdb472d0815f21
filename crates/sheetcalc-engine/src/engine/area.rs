//! Lazy reference and area views.
//!
//! Reference tokens evaluate to these views instead of values. A view only
//! knows coordinates; reading a cell goes through a [`CellSource`], which for
//! a live workbook is the evaluator itself. Intermediate array results are
//! held in materialized areas that carry their own values.

use std::fmt;
use std::sync::Arc;

use super::cell_ref::{CellRangeAddress, CellRef, MAX_COLUMNS, MAX_ROWS};
use super::error::{EvalError, Result};
use super::value::ValueEval;

/// Resolves absolute cell positions to values.
pub trait CellSource {
    fn cell_value(&self, sheet_index: usize, row: usize, col: usize) -> Result<ValueEval>;
}

/// Consecutive sheet indexes covered by a reference (one for plain references).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct SheetIndexRange {
    pub first: usize,
    pub last: usize,
}

impl SheetIndexRange {
    pub fn single(index: usize) -> Self {
        SheetIndexRange {
            first: index,
            last: index,
        }
    }

    pub fn new(first: usize, last: usize) -> Self {
        SheetIndexRange {
            first: first.min(last),
            last: first.max(last),
        }
    }

    pub fn is_single(&self) -> bool {
        self.first == self.last
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> {
        self.first..=self.last
    }
}

impl fmt::Display for SheetIndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

/// A single-cell reference. Dereferencing a 3-D reference reads its first sheet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefEval {
    pub sheets: SheetIndexRange,
    pub row: usize,
    pub col: usize,
}

impl RefEval {
    pub fn new(sheets: SheetIndexRange, row: usize, col: usize) -> Self {
        RefEval { sheets, row, col }
    }

    pub fn inner_value(&self, source: &dyn CellSource) -> Result<ValueEval> {
        source.cell_value(self.sheets.first, self.row, self.col)
    }

    /// The reference viewed as a 1x1 sheet-backed area.
    pub fn as_area(&self) -> AreaEval {
        AreaEval::sheet_backed(self.sheets, CellRangeAddress::single(self.row, self.col))
    }

    pub fn offset(
        &self,
        rel_first_row: isize,
        rel_last_row: isize,
        rel_first_col: isize,
        rel_last_col: isize,
    ) -> Result<AreaEval> {
        self.as_area()
            .offset(rel_first_row, rel_last_row, rel_first_col, rel_last_col)
    }
}

impl fmt::Display for RefEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref[{}!{}]", self.sheets, CellRef::new(self.col, self.row))
    }
}

/// A rectangular view over cells.
#[derive(Clone, Debug, PartialEq)]
pub enum AreaEval {
    /// Backed by live sheet cells, resolved on demand.
    SheetBacked {
        sheets: SheetIndexRange,
        bounds: CellRangeAddress,
    },
    /// Backed by an already computed array, row-major.
    Materialized {
        bounds: CellRangeAddress,
        values: Arc<[ValueEval]>,
    },
}

impl AreaEval {
    pub fn sheet_backed(sheets: SheetIndexRange, bounds: CellRangeAddress) -> Self {
        AreaEval::SheetBacked { sheets, bounds }
    }

    /// Wrap computed values. `values` must hold exactly `height * width` entries.
    pub fn materialized(bounds: CellRangeAddress, values: Vec<ValueEval>) -> Result<Self> {
        let expected = bounds.width() * bounds.height();
        if values.len() != expected {
            return Err(EvalError::InvalidArgument(format!(
                "{} values do not fill a {}x{} area",
                values.len(),
                bounds.height(),
                bounds.width()
            )));
        }
        Ok(AreaEval::Materialized {
            bounds,
            values: values.into(),
        })
    }

    pub fn bounds(&self) -> CellRangeAddress {
        match self {
            AreaEval::SheetBacked { bounds, .. } | AreaEval::Materialized { bounds, .. } => *bounds,
        }
    }

    /// Sheets of a sheet-backed area; None for materialized areas.
    pub fn sheets(&self) -> Option<SheetIndexRange> {
        match self {
            AreaEval::SheetBacked { sheets, .. } => Some(*sheets),
            AreaEval::Materialized { .. } => None,
        }
    }

    /// Backing values of a materialized area.
    pub fn values(&self) -> Option<&[ValueEval]> {
        match self {
            AreaEval::SheetBacked { .. } => None,
            AreaEval::Materialized { values, .. } => Some(values),
        }
    }

    pub fn first_row(&self) -> usize {
        self.bounds().first_row
    }

    pub fn last_row(&self) -> usize {
        self.bounds().last_row
    }

    pub fn first_column(&self) -> usize {
        self.bounds().first_col
    }

    pub fn last_column(&self) -> usize {
        self.bounds().last_col
    }

    pub fn width(&self) -> usize {
        self.bounds().width()
    }

    pub fn height(&self) -> usize {
        self.bounds().height()
    }

    pub fn is_single_cell(&self) -> bool {
        self.width() == 1 && self.height() == 1
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.bounds().contains(row, col)
    }

    /// Read the value at a position relative to the top-left corner.
    pub fn relative_value(
        &self,
        source: &dyn CellSource,
        rel_row: usize,
        rel_col: usize,
    ) -> Result<ValueEval> {
        let height = self.height();
        let width = self.width();
        if rel_row >= height {
            return Err(EvalError::IndexOutOfRange {
                index: rel_row,
                len: height,
            });
        }
        if rel_col >= width {
            return Err(EvalError::IndexOutOfRange {
                index: rel_col,
                len: width,
            });
        }
        match self {
            AreaEval::SheetBacked { sheets, bounds } => source.cell_value(
                sheets.first,
                bounds.first_row + rel_row,
                bounds.first_col + rel_col,
            ),
            AreaEval::Materialized { values, .. } => Ok(values[rel_row * width + rel_col].clone()),
        }
    }

    /// Read the value at an absolute sheet position inside the area.
    pub fn absolute_value(&self, source: &dyn CellSource, row: usize, col: usize) -> Result<ValueEval> {
        let bounds = self.bounds();
        if !bounds.contains(row, col) {
            return Err(EvalError::InvalidArgument(format!(
                "{} is outside {}",
                CellRef::new(col, row),
                bounds
            )));
        }
        self.relative_value(source, row - bounds.first_row, col - bounds.first_col)
    }

    /// One row of the area as a 1xN area.
    pub fn get_row(&self, rel_row: usize) -> Result<AreaEval> {
        if rel_row >= self.height() {
            return Err(EvalError::InvalidArgument(format!(
                "Invalid row number ({}) - must be 0..{}",
                rel_row,
                self.height()
            )));
        }
        let last_col = self.width() as isize - 1;
        let row = rel_row as isize;
        self.offset(row, row, 0, last_col)
    }

    /// One column of the area as an Nx1 area.
    pub fn get_column(&self, rel_col: usize) -> Result<AreaEval> {
        if rel_col >= self.width() {
            return Err(EvalError::InvalidArgument(format!(
                "Invalid column number ({}) - must be 0..{}",
                rel_col,
                self.width()
            )));
        }
        let last_row = self.height() as isize - 1;
        let col = rel_col as isize;
        self.offset(0, last_row, col, col)
    }

    /// A new area positioned relative to this one's top-left corner.
    ///
    /// Sheet-backed areas just move their window. Materialized areas copy the
    /// overlapping values; positions outside the original bounds read as blank.
    pub fn offset(
        &self,
        rel_first_row: isize,
        rel_last_row: isize,
        rel_first_col: isize,
        rel_last_col: isize,
    ) -> Result<AreaEval> {
        let current = self.bounds();
        let target = CellRangeAddress::new(
            offset_index(current.first_row, rel_first_row, MAX_ROWS)?,
            offset_index(current.first_col, rel_first_col, MAX_COLUMNS)?,
            offset_index(current.first_row, rel_last_row, MAX_ROWS)?,
            offset_index(current.first_col, rel_last_col, MAX_COLUMNS)?,
        );
        match self {
            AreaEval::SheetBacked { sheets, .. } => Ok(AreaEval::sheet_backed(*sheets, target)),
            AreaEval::Materialized { values, .. } => {
                let width = current.width();
                let copied = target
                    .cells()
                    .map(|cell| {
                        if current.contains(cell.row, cell.col) {
                            let index =
                                (cell.row - current.first_row) * width + (cell.col - current.first_col);
                            values[index].clone()
                        } else {
                            ValueEval::Blank
                        }
                    })
                    .collect::<Vec<_>>();
                Ok(AreaEval::Materialized {
                    bounds: target,
                    values: copied.into(),
                })
            }
        }
    }
}

fn offset_index(base: usize, delta: isize, limit: usize) -> Result<usize> {
    base.checked_add_signed(delta)
        .filter(|index| *index < limit)
        .ok_or_else(|| {
            EvalError::InvalidArgument(format!("offset {} from {} leaves the grid", delta, base))
        })
}

impl fmt::Display for AreaEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaEval::SheetBacked { sheets, bounds } => write!(f, "Area[{}!{}]", sheets, bounds),
            AreaEval::Materialized { bounds, .. } => write!(f, "Array[{}]", bounds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Source that answers `row * 10 + col` and records what was read.
    struct GridSource {
        reads: RefCell<Vec<(usize, usize, usize)>>,
    }

    impl GridSource {
        fn new() -> Self {
            GridSource {
                reads: RefCell::new(Vec::new()),
            }
        }
    }

    impl CellSource for GridSource {
        fn cell_value(&self, sheet_index: usize, row: usize, col: usize) -> Result<ValueEval> {
            self.reads.borrow_mut().push((sheet_index, row, col));
            Ok(ValueEval::Number((row * 10 + col) as f64))
        }
    }

    fn ones(bounds: CellRangeAddress) -> AreaEval {
        let count = bounds.width() * bounds.height();
        AreaEval::materialized(bounds, vec![ValueEval::Number(1.0); count]).unwrap()
    }

    #[test]
    fn test_materialized_offset_fills_blank_outside_bounds() {
        let area = ones(CellRangeAddress::new(0, 0, 2, 2));
        let source = GridSource::new();
        let shifted = area.offset(1, 3, 1, 3).unwrap();
        assert_eq!(shifted.bounds(), CellRangeAddress::new(1, 1, 3, 3));
        for r in 0..3 {
            for c in 0..3 {
                let expected = if r < 2 && c < 2 {
                    ValueEval::Number(1.0)
                } else {
                    ValueEval::Blank
                };
                assert_eq!(shifted.relative_value(&source, r, c).unwrap(), expected);
            }
        }
        assert!(source.reads.borrow().is_empty());
    }

    #[test]
    fn test_sheet_backed_offset_moves_window_without_reading() {
        let area = AreaEval::sheet_backed(SheetIndexRange::single(0), CellRangeAddress::new(2, 1, 4, 3));
        let source = GridSource::new();
        let moved = area.offset(-1, 0, 1, 1).unwrap();
        assert_eq!(moved.bounds(), CellRangeAddress::new(1, 2, 2, 2));
        assert!(source.reads.borrow().is_empty());
        assert_eq!(moved.relative_value(&source, 1, 0).unwrap(), ValueEval::Number(22.0));
    }

    #[test]
    fn test_offset_before_origin_is_rejected() {
        let area = AreaEval::sheet_backed(SheetIndexRange::single(0), CellRangeAddress::single(0, 0));
        assert!(matches!(
            area.offset(-1, 0, 0, 0),
            Err(EvalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_relative_value_is_index_checked() {
        let area = ones(CellRangeAddress::new(0, 0, 1, 1));
        let source = GridSource::new();
        assert_eq!(
            area.relative_value(&source, 2, 0),
            Err(EvalError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_get_row_and_column() {
        let area = AreaEval::sheet_backed(SheetIndexRange::single(1), CellRangeAddress::new(0, 0, 2, 3));
        let row = area.get_row(1).unwrap();
        assert_eq!(row.bounds(), CellRangeAddress::new(1, 0, 1, 3));
        let col = area.get_column(3).unwrap();
        assert_eq!(col.bounds(), CellRangeAddress::new(0, 3, 2, 3));
        assert!(matches!(area.get_row(3), Err(EvalError::InvalidArgument(_))));
        assert!(matches!(area.get_column(4), Err(EvalError::InvalidArgument(_))));
    }

    #[test]
    fn test_materialized_get_row_copies_values() {
        let bounds = CellRangeAddress::new(0, 0, 1, 1);
        let values = vec![1.0, 2.0, 3.0, 4.0]
            .into_iter()
            .map(ValueEval::Number)
            .collect();
        let area = AreaEval::materialized(bounds, values).unwrap();
        let row = area.get_row(1).unwrap();
        assert_eq!(
            row.values().unwrap(),
            &[ValueEval::Number(3.0), ValueEval::Number(4.0)]
        );
    }

    #[test]
    fn test_ref_reads_first_sheet() {
        let source = GridSource::new();
        let r = RefEval::new(SheetIndexRange::new(2, 1), 0, 1);
        assert_eq!(r.inner_value(&source).unwrap(), ValueEval::Number(1.0));
        assert_eq!(source.reads.borrow()[0], (1, 0, 1));
    }

    #[test]
    fn test_materialized_rejects_wrong_value_count() {
        let result = AreaEval::materialized(CellRangeAddress::new(0, 0, 1, 1), vec![ValueEval::Blank]);
        assert!(result.is_err());
    }
}
