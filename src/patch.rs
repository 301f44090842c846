//! Batched partial updates of a document's cells.
//!
//! A patch is validated without touching storage, then merged into the
//! document under its exclusive lock and persisted as one unit. Concurrent
//! patches on the same document are applied one after the other; each one
//! sees everything committed before it.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::address::parse_cell_ref;
use crate::cell::CellId;
use crate::document::{Document, DocumentId, SheetState};
use crate::error::{Result, SheetError};
use crate::store::DocumentStore;

/// One edit as it arrives from a caller: either an A1 reference in `cell`,
/// or zero-based `row`/`col`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<i64>,
    #[serde(default)]
    pub value: String,
}

impl EditInput {
    pub fn at_cell<S: Into<String>, V: Into<String>>(cell: S, value: V) -> Self {
        EditInput {
            cell: Some(cell.into()),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn at(row: i64, col: i64, value: impl Into<String>) -> Self {
        EditInput {
            row: Some(row),
            col: Some(col),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// A positioned edit. Coordinates are signed because callers may send
/// negative ones; those are dropped before anything is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEdit {
    pub row: i64,
    pub col: i64,
    pub value: String,
}

impl CellEdit {
    pub fn new(row: i64, col: i64, value: impl Into<String>) -> Self {
        CellEdit {
            row,
            col,
            value: value.into(),
        }
    }

    fn cell_id(&self) -> Option<CellId> {
        let row = u32::try_from(self.row).ok()?;
        let col = u32::try_from(self.col).ok()?;
        Some(CellId::new(row, col))
    }
}

/// Turns caller input into positioned edits.
///
/// An input with a non-empty `cell` is resolved as A1; otherwise both `row`
/// and `col` must be present. Inputs that resolve to nothing usable
/// (malformed reference, missing coordinate, negative index) are dropped.
///
/// # Errors
/// * Validation error when `inputs` is empty or longer than `max_edits`
/// * Validation error when no input survives
pub fn resolve_edits(inputs: &[EditInput], max_edits: usize) -> Result<Vec<CellEdit>> {
    if inputs.is_empty() {
        return Err(SheetError::validation("edits is required"));
    }
    if inputs.len() > max_edits {
        return Err(SheetError::validation(format!(
            "too many edits (max {max_edits})"
        )));
    }

    let edits: Vec<CellEdit> = inputs
        .iter()
        .filter_map(|input| {
            let (row, col) = match (input.cell.as_deref().map(str::trim), input.row, input.col) {
                (Some(cell), _, _) if !cell.is_empty() => {
                    let (row, col) = parse_cell_ref(cell).ok()?;
                    (row as i64, col as i64)
                }
                (_, Some(row), Some(col)) => (row, col),
                _ => return None,
            };
            let edit = CellEdit::new(row, col, input.value.clone());
            edit.cell_id().map(|_| edit)
        })
        .collect();

    if edits.is_empty() {
        return Err(SheetError::validation("no valid edits"));
    }
    Ok(edits)
}

/// Merges `edits` into `state` in order and returns how many were applied.
///
/// Each edit replaces the cell's raw value and drops its `computed` value;
/// other fields on the cell are kept. `row_count` only ever grows.
pub fn apply_edits(state: &mut SheetState, edits: &[CellEdit]) -> usize {
    let mut applied = 0;
    let mut max_row: Option<u32> = None;

    for edit in edits {
        let Some(id) = edit.cell_id() else {
            continue;
        };
        state.data.upsert(id).set_value(edit.value.clone());
        max_row = max_row.max(Some(id.row));
        applied += 1;
    }

    if let Some(max_row) = max_row {
        let needed = max_row as u64 + 1;
        if state.row_count.is_none_or(|current| needed > current) {
            state.set_row_count(needed);
        }
    }
    applied
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub document: Document,
    /// Edits applied after dropping unusable ones.
    pub applied: usize,
}

/// Applies `edits` to document `id` as one transaction.
///
/// # Errors
/// * Validation error if no edit has non-negative coordinates (storage is not touched)
/// * `NotFound` if the document does not exist
/// * Storage error if persisting fails; nothing is committed in that case
pub fn patch_document<S: DocumentStore + ?Sized>(
    store: &S,
    id: DocumentId,
    edits: &[CellEdit],
) -> Result<PatchOutcome> {
    let valid: Vec<CellEdit> = edits
        .iter()
        .filter(|edit| edit.cell_id().is_some())
        .cloned()
        .collect();
    if valid.is_empty() {
        return Err(SheetError::validation("no valid edits"));
    }
    debug!("patch on document {}: {} edits validated", id, valid.len());

    let mut applied = 0;
    let document = store.update(id, &mut |doc| {
        debug!("patch on document {}: lock acquired", id);
        applied = apply_edits(&mut doc.state, &valid);
        Ok(())
    })?;
    debug!("patch on document {}: {} edits committed", id, applied);

    Ok(PatchOutcome { document, applied })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellRecord;
    use crate::store::SheetStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn patch_grows_row_count_and_clears_computed() {
        let mut state = SheetState::from_json(json!({
            "data": {"5,2": {"value": "=A1", "computed": "41"}},
            "rowCount": 3
        }))
        .unwrap();

        let applied = apply_edits(&mut state, &[CellEdit::new(5, 2, "42")]);

        assert_eq!(applied, 1);
        assert_eq!(state.row_count, Some(6));
        assert_eq!(state.data.get(5, 2), Some(&CellRecord::with_value("42")));
    }

    #[test]
    fn row_count_never_shrinks() {
        let mut state = SheetState {
            row_count: Some(100),
            ..Default::default()
        };
        apply_edits(&mut state, &[CellEdit::new(4, 0, "x")]);
        assert_eq!(state.row_count, Some(100));
    }

    #[test]
    fn missing_row_count_is_initialized() {
        let mut state = SheetState::default();
        apply_edits(&mut state, &[CellEdit::new(0, 0, "x"), CellEdit::new(9, 1, "y")]);
        assert_eq!(state.row_count, Some(10));
    }

    #[test]
    fn patch_replaces_unusable_row_count() {
        let mut state = SheetState::from_json(json!({"data": {}, "rowCount": "n/a"})).unwrap();
        apply_edits(&mut state, &[CellEdit::new(2, 0, "x")]);
        assert_eq!(state.row_count, Some(3));
        assert_eq!(state.to_json().unwrap()["rowCount"], json!(3));
        assert!(!state.extra.contains_key("rowCount"));
    }

    #[test]
    fn later_edits_to_the_same_cell_win() {
        let mut state = SheetState::default();
        let applied = apply_edits(
            &mut state,
            &[CellEdit::new(0, 0, "first"), CellEdit::new(0, 0, "second")],
        );
        assert_eq!(applied, 2);
        assert_eq!(state.data.get(0, 0).unwrap().raw_text(), "second");
    }

    #[test]
    fn negative_coordinates_are_skipped() {
        let mut state = SheetState::default();
        let applied = apply_edits(
            &mut state,
            &[CellEdit::new(-1, 0, "no"), CellEdit::new(1, -3, "no"), CellEdit::new(1, 1, "yes")],
        );
        assert_eq!(applied, 1);
        assert_eq!(state.data.len(), 1);
        assert_eq!(state.row_count, Some(2));
    }

    #[test]
    fn unknown_state_fields_are_preserved() {
        let mut state = SheetState::from_json(json!({
            "data": {"0,0": {"value": "a", "style": {"italic": true}}, "A1": {"value": "legacy"}},
            "rowCount": 1,
            "columnWidths": {"0": 80}
        }))
        .unwrap();

        apply_edits(&mut state, &[CellEdit::new(0, 0, "b")]);

        assert_eq!(
            state.to_json().unwrap(),
            json!({
                "data": {"0,0": {"value": "b", "style": {"italic": true}}, "A1": {"value": "legacy"}},
                "rowCount": 1,
                "columnWidths": {"0": 80}
            })
        );
    }

    #[test]
    fn resolves_a1_and_row_col_inputs() {
        let edits = resolve_edits(
            &[
                EditInput::at_cell("B2", "a1"),
                EditInput::at(4, 0, "rc"),
                EditInput::at_cell("not a ref", "dropped"),
                EditInput::at(-1, 0, "dropped"),
                EditInput {
                    row: Some(3),
                    ..Default::default()
                },
            ],
            1000,
        )
        .unwrap();
        assert_eq!(edits, vec![CellEdit::new(1, 1, "a1"), CellEdit::new(4, 0, "rc")]);
    }

    #[test]
    fn cell_reference_takes_precedence_over_coordinates() {
        let input = EditInput {
            cell: Some("C3".into()),
            row: Some(0),
            col: Some(0),
            value: "v".into(),
        };
        assert_eq!(resolve_edits(&[input], 10).unwrap(), vec![CellEdit::new(2, 2, "v")]);
    }

    #[test]
    fn batch_validation() {
        assert!(matches!(resolve_edits(&[], 10), Err(SheetError::Validation(_))));
        let too_many = vec![EditInput::at(0, 0, "x"); 11];
        assert!(matches!(resolve_edits(&too_many, 10), Err(SheetError::Validation(_))));
        assert!(matches!(
            resolve_edits(&[EditInput::at(-1, -1, "x")], 10),
            Err(SheetError::Validation(_))
        ));
    }

    #[test]
    fn patch_document_commits_and_counts() {
        let store = SheetStore::in_memory();
        let doc = store
            .create(1, "Sheet", SheetState { row_count: Some(3), ..Default::default() })
            .unwrap();

        let outcome = patch_document(
            &store,
            doc.id,
            &[CellEdit::new(5, 2, "42"), CellEdit::new(-1, 0, "dropped")],
        )
        .unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.document.state.row_count, Some(6));
        assert_eq!(store.load(doc.id).unwrap().unwrap(), outcome.document);
    }

    #[test]
    fn patch_document_validates_before_storage() {
        let store = SheetStore::in_memory();
        // The document does not exist, yet validation fails first.
        let err = patch_document(&store, 77, &[CellEdit::new(-1, 0, "x")]).unwrap_err();
        assert!(matches!(err, SheetError::Validation(_)));

        let err = patch_document(&store, 77, &[CellEdit::new(0, 0, "x")]).unwrap_err();
        assert!(matches!(err, SheetError::NotFound));
    }
}
