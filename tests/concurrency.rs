use pretty_assertions::assert_eq;
use sheetstore::patch::{CellEdit, patch_document};
use sheetstore::{Config, DocumentStore, EditInput, FileService, SheetState, SheetStore};
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: u32 = 16;
const EDITS_PER_WRITER: u32 = 25;

#[test]
fn concurrent_patches_on_one_document_lose_nothing() {
    let store = Arc::new(SheetStore::in_memory());
    let doc = store.create(1, "Shared", SheetState::default()).unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS as usize));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..EDITS_PER_WRITER {
                    // Every writer owns one column; each patch adds one row to it.
                    let edit = CellEdit::new(i as i64, writer as i64, format!("{writer}:{i}"));
                    patch_document(store.as_ref(), doc.id, &[edit]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let committed = store.load(doc.id).unwrap().unwrap();
    assert_eq!(committed.state.data.len(), (WRITERS * EDITS_PER_WRITER) as usize);
    for writer in 0..WRITERS {
        for i in 0..EDITS_PER_WRITER {
            assert_eq!(
                committed.state.data.get(i, writer).unwrap().raw_text(),
                format!("{writer}:{i}")
            );
        }
    }
    assert_eq!(committed.state.row_count, Some(EDITS_PER_WRITER as u64));
}

#[test]
fn documents_are_patched_independently() {
    let store = Arc::new(SheetStore::in_memory());
    let ids: Vec<u64> = (0..8)
        .map(|i| store.create(1, &format!("Sheet {i}"), SheetState::default()).unwrap().id)
        .collect();

    let handles: Vec<_> = ids
        .iter()
        .map(|&id| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for row in 0..50 {
                    patch_document(store.as_ref(), id, &[CellEdit::new(row, 0, id.to_string())])
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for id in ids {
        let doc = store.load(id).unwrap().unwrap();
        assert_eq!(doc.state.data.len(), 50);
        assert!(doc.state.data.iter().all(|(_, cell)| cell.raw_text() == id.to_string()));
    }
}

#[test]
fn readers_only_see_whole_batches() {
    let store = Arc::new(SheetStore::in_memory());
    let doc = store.create(1, "Pairs", SheetState::default()).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..200 {
                let value = i.to_string();
                let batch = [CellEdit::new(0, 0, value.clone()), CellEdit::new(0, 1, value)];
                patch_document(store.as_ref(), doc.id, &batch).unwrap();
            }
        })
    };

    while !writer.is_finished() {
        let snapshot = store.load(doc.id).unwrap().unwrap();
        let a = snapshot.state.data.get(0, 0).map(|c| c.raw_text());
        let b = snapshot.state.data.get(0, 1).map(|c| c.raw_text());
        assert_eq!(a, b);
    }
    writer.join().unwrap();
}

#[test]
fn service_patches_from_many_editors() {
    let store = Arc::new(SheetStore::in_memory());
    let owner = store.register_user("Olga", "olga@example.com").unwrap().id;
    let service = FileService::new(Arc::clone(&store), &Config::default());
    let id = service.save(owner, None, "Team", serde_json::json!({})).unwrap().id;

    let editors: Vec<u64> = (0..4)
        .map(|i| {
            let email = format!("editor{i}@example.com");
            let user = store.register_user(&format!("Editor {i}"), &email).unwrap();
            service.create_share(owner, id, &email, "editor").unwrap();
            user.id
        })
        .collect();

    let handles: Vec<_> = editors
        .iter()
        .enumerate()
        .map(|(col, &editor)| {
            let service = service.clone();
            thread::spawn(move || {
                for row in 0..20 {
                    let result = service
                        .patch_cells(editor, id, &[EditInput::at(row, col as i64, "x")])
                        .unwrap();
                    assert_eq!(result.updated, 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let doc = service.get(owner, id).unwrap().document;
    assert_eq!(doc.state.data.len(), 80);
    assert_eq!(doc.state.row_count, Some(20));
}

#[test]
fn share_racing_delete_never_outlives_the_document() {
    let store = Arc::new(SheetStore::in_memory());
    for round in 0..50 {
        let doc = store.create(1, &format!("Race {round}"), SheetState::default()).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let sharer = {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.upsert_share(doc.id, 2, "editor").is_ok()
            })
        };
        barrier.wait();
        let deleted = store.delete(doc.id).unwrap();
        let shared = sharer.join().unwrap();

        assert!(deleted);
        assert!(store.load(doc.id).unwrap().is_none());
        assert!(store.shares_for_document(doc.id).unwrap().is_empty(), "shared: {shared}");
    }
}
