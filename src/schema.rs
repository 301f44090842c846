//! Best-effort description of a sheet's layout.
//!
//! The header row and category columns are guesses. Callers should present
//! them as hints.

use serde::{Deserialize, Serialize};

use crate::address::column_label;
use crate::document::{SheetState, used_range};
use crate::range::CellBounds;

/// Rows examined, starting at the top of the used range, when guessing the header.
pub const HEADER_SCAN_ROWS: u32 = 5;

/// Extra weight given to a text-like cell when scoring header candidates.
const TEXT_LIKE_WEIGHT: f64 = 0.25;

/// Header fragments that suggest a column groups rows into categories.
/// Compared against headers lower-cased with spaces removed.
const CATEGORY_KEYWORDS: &[&str] = &[
    "category",
    "kategoriya",
    "categoriya",
    "катег",
    "категория",
    "tur",
    "type",
    "group",
    "bo'lim",
    "bo‘lim",
    "section",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedRange {
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
    /// e.g. `"A1:B2"`
    pub a1: String,
}

impl From<CellBounds> for UsedRange {
    fn from(bounds: CellBounds) -> Self {
        UsedRange {
            min_row: bounds.min_row,
            max_row: bounds.max_row,
            min_col: bounds.min_col,
            max_col: bounds.max_col,
            a1: bounds.to_a1(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub col: u32,
    pub label: String,
    pub header: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCandidate {
    pub col: u32,
    pub label: String,
    /// The keyword that matched
    pub keyword: String,
    /// The header text it matched in
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SheetSchema {
    pub used_range: Option<UsedRange>,
    pub header_row: Option<u32>,
    pub columns: Vec<ColumnInfo>,
    pub category_candidates: Vec<CategoryCandidate>,
}

/// A cell reads as text when it has a letter in it and is not a number.
pub fn is_text_like(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.chars().any(char::is_alphabetic) && trimmed.parse::<f64>().is_err()
}

fn row_score(state: &SheetState, row: u32, min_col: u32, max_col: u32) -> f64 {
    let mut non_empty = 0u32;
    let mut text_like = 0u32;
    for col in min_col..=max_col {
        let Some(record) = state.data.get(row, col) else {
            continue;
        };
        let value = record.raw_text();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        non_empty += 1;
        if is_text_like(value) {
            text_like += 1;
        }
    }
    non_empty as f64 + text_like as f64 * TEXT_LIKE_WEIGHT
}

/// Picks the best-scoring of the first [`HEADER_SCAN_ROWS`] rows of `bounds`.
/// On a tie the earlier row wins.
pub fn guess_header_row(state: &SheetState, bounds: CellBounds) -> u32 {
    let last = bounds
        .max_row
        .min(bounds.min_row.saturating_add(HEADER_SCAN_ROWS - 1));
    let mut header_row = bounds.min_row;
    let mut best = f64::NEG_INFINITY;
    for row in bounds.min_row..=last {
        let score = row_score(state, row, bounds.min_col, bounds.max_col);
        if score > best {
            best = score;
            header_row = row;
        }
    }
    header_row
}

/// First category keyword contained in `header`, if any.
pub fn match_category_keyword(header: &str) -> Option<&'static str> {
    let normalized = header.to_lowercase().replace(' ', "");
    if normalized.is_empty() {
        return None;
    }
    CATEGORY_KEYWORDS
        .iter()
        .copied()
        .find(|kw| normalized.contains(&kw.to_lowercase().replace(' ', "")))
}

/// Describes the used range, header row and columns of a sheet.
///
/// At most `max_cols` columns, counted from the left edge of the used range,
/// are examined and described. The reported used range is not truncated.
pub fn infer_schema(state: &SheetState, max_cols: u32) -> SheetSchema {
    let Some(bounds) = used_range(state) else {
        return SheetSchema::default();
    };

    let mut scan = bounds;
    if bounds.col_count() > max_cols as u64 {
        scan.max_col = bounds.min_col + max_cols.max(1) - 1;
    }

    let header_row = guess_header_row(state, scan);

    let mut columns = Vec::with_capacity(scan.col_count() as usize);
    let mut category_candidates = Vec::new();
    for col in scan.min_col..=scan.max_col {
        let header = state
            .data
            .get(header_row, col)
            .map(|record| record.raw_text().trim().to_string())
            .unwrap_or_default();
        let label = column_label(col);

        if let Some(keyword) = match_category_keyword(&header) {
            category_candidates.push(CategoryCandidate {
                col,
                label: label.clone(),
                keyword: keyword.to_string(),
                text: header.clone(),
            });
        }
        columns.push(ColumnInfo { col, label, header });
    }

    SheetSchema {
        used_range: Some(bounds.into()),
        header_row: Some(header_row),
        columns,
        category_candidates,
    }
}
