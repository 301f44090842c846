//! A1 range expressions and their inclusive bounds.

use serde::{Deserialize, Serialize};

use crate::address::{cell_name, parse_cell_ref};
use crate::error::{Result, SheetError};

/// Inclusive, normalized rectangle of zero-based cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBounds {
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
}

impl CellBounds {
    /// Builds bounds from two corners given in any order.
    pub fn from_corners((r1, c1): (u32, u32), (r2, c2): (u32, u32)) -> Self {
        CellBounds {
            min_row: r1.min(r2),
            max_row: r1.max(r2),
            min_col: c1.min(c2),
            max_col: c1.max(c2),
        }
    }

    pub fn single(row: u32, col: u32) -> Self {
        Self::from_corners((row, col), (row, col))
    }

    pub fn row_count(&self) -> u64 {
        (self.max_row - self.min_row) as u64 + 1
    }

    pub fn col_count(&self) -> u64 {
        (self.max_col - self.min_col) as u64 + 1
    }

    /// Saturates at `u64::MAX`; a full-sheet range holds 2^64 cells.
    pub fn cell_count(&self) -> u64 {
        self.row_count()
            .checked_mul(self.col_count())
            .unwrap_or(u64::MAX)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.min_row..=self.max_row).contains(&row) && (self.min_col..=self.max_col).contains(&col)
    }

    /// A1 form, e.g. `"A1:B2"`.
    pub fn to_a1(&self) -> String {
        format!(
            "{}:{}",
            cell_name(self.min_row, self.min_col),
            cell_name(self.max_row, self.max_col)
        )
    }
}

/// Parses `"A1:D20"` or a single reference like `"B2"` into normalized bounds.
pub fn resolve_range(expr: &str) -> Result<CellBounds> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(SheetError::InvalidRange(expr.to_string()));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let invalid = |_: SheetError| SheetError::InvalidRange(expr.to_string());
    match parts.as_slice() {
        [single] => {
            let (row, col) = parse_cell_ref(single).map_err(invalid)?;
            Ok(CellBounds::single(row, col))
        }
        [start, end] => {
            let a = parse_cell_ref(start).map_err(invalid)?;
            let b = parse_cell_ref(end).map_err(invalid)?;
            Ok(CellBounds::from_corners(a, b))
        }
        _ => Err(SheetError::InvalidRange(expr.to_string())),
    }
}

/// Resolves a range and rejects it when it covers more than `max_cells` cells.
pub fn resolve_read_range(expr: &str, max_cells: u64) -> Result<CellBounds> {
    let bounds = resolve_range(expr)?;
    let cells = bounds.cell_count();
    if cells > max_cells {
        return Err(SheetError::RangeTooLarge {
            cells,
            max: max_cells,
        });
    }
    Ok(bounds)
}
