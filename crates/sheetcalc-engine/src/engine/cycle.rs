//! In-progress tracking for recursive evaluation.
//!
//! Each formula cell being evaluated holds an [`EvaluationGuard`]. A cell that
//! is requested again while its guard is alive is circular. The guard removes
//! its entry on drop, so the marker is cleared on every exit path, including
//! early returns through `?`.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use log::warn;

use super::cell_ref::CellCoordinate;
use super::error::{EvalError, Result};

#[derive(Debug)]
pub(crate) struct EvaluationTracker {
    frames: RefCell<Vec<CellCoordinate>>,
    visiting: RefCell<HashSet<CellCoordinate>>,
    depth: Cell<usize>,
    max_depth: usize,
}

impl EvaluationTracker {
    pub(crate) fn new(max_depth: usize) -> Self {
        EvaluationTracker {
            frames: RefCell::new(Vec::new()),
            visiting: RefCell::new(HashSet::new()),
            depth: Cell::new(0),
            max_depth,
        }
    }

    /// Mark `coord` as in progress.
    ///
    /// Returns `Ok(None)` when the cell is already on the current call path.
    pub(crate) fn start_evaluate(&self, coord: CellCoordinate) -> Result<Option<EvaluationGuard<'_>>> {
        if self.visiting.borrow().contains(&coord) {
            return Ok(None);
        }
        self.enter()?;
        self.visiting.borrow_mut().insert(coord);
        self.frames.borrow_mut().push(coord);
        Ok(Some(EvaluationGuard {
            tracker: self,
            coord: Some(coord),
        }))
    }

    /// Count one level of recursion that is not a cell, such as a defined name.
    pub(crate) fn enter_name(&self) -> Result<EvaluationGuard<'_>> {
        self.enter()?;
        Ok(EvaluationGuard {
            tracker: self,
            coord: None,
        })
    }

    #[cfg(test)]
    pub(crate) fn is_evaluating(&self, coord: &CellCoordinate) -> bool {
        self.visiting.borrow().contains(coord)
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.get()
    }

    fn enter(&self) -> Result<()> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            warn!("evaluation depth limit of {} reached", self.max_depth);
            return Err(EvalError::RecursionLimit {
                limit: self.max_depth,
            });
        }
        self.depth.set(depth + 1);
        Ok(())
    }
}

pub(crate) struct EvaluationGuard<'t> {
    tracker: &'t EvaluationTracker,
    coord: Option<CellCoordinate>,
}

impl EvaluationGuard<'_> {
    /// True when this cell is the outermost one on the call path.
    pub(crate) fn is_top_frame(&self) -> bool {
        self.coord.is_some() && self.tracker.frames.borrow().len() == 1
    }
}

impl Drop for EvaluationGuard<'_> {
    fn drop(&mut self) {
        if let Some(coord) = self.coord {
            self.tracker.frames.borrow_mut().pop();
            self.tracker.visiting.borrow_mut().remove(&coord);
        }
        self.tracker.depth.set(self.tracker.depth.get().saturating_sub(1));
    }
}
