use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::range::Bounds;
use std::collections::HashMap;

/// One worksheet loaded into memory: its non-empty cells and the used range.
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    pub name: String,
    pub cells: Vec<Cell>,
    /// Position of each cell in `cells`, keyed by `(row, col)`
    indexes: HashMap<(usize, usize), usize>,
    row_lower_bound: Option<usize>,
    row_upper_bound: Option<usize>,
    col_lower_bound: Option<usize>,
    col_upper_bound: Option<usize>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell. A later cell at the same position replaces the earlier one.
    pub fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        match self.indexes.get(&(cell.row, cell.col)) {
            Some(&index) => self.cells[index] = cell,
            None => {
                self.indexes.insert((cell.row, cell.col), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        let lower = |bound: Option<usize>, value: usize| Some(bound.map_or(value, |bound| bound.min(value)));
        let upper = |bound: Option<usize>, value: usize| Some(bound.map_or(value, |bound| bound.max(value)));
        self.row_lower_bound = lower(self.row_lower_bound, row);
        self.row_upper_bound = upper(self.row_upper_bound, row);
        self.col_lower_bound = lower(self.col_lower_bound, col);
        self.col_upper_bound = upper(self.col_upper_bound, col);
    }

    /// The rectangle spanning every non-empty cell, `None` for an empty sheet.
    pub fn used_range(&self) -> Option<Bounds> {
        Some(Bounds {
            row_lower: self.row_lower_bound?,
            row_upper: self.row_upper_bound?,
            col_lower: self.col_lower_bound?,
            col_upper: self.col_upper_bound?,
        })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.indexes
            .get(&(row, col))
            .and_then(|index| self.cells.get(*index))
    }
}
