/*!
# Sheetstore

A document store for spreadsheets with a cell-level patch engine, built in Rust.

## Overview

Each document is a named spreadsheet owned by one user. Its content is a
JSON state blob whose `data` field maps `"row,col"` keys to cell records.
Documents can be shared with other users as viewers or editors, read back
range by range, described by a best-effort schema, and updated either by
replacing the whole state or by patching individual cells.

## Architecture

### Addressing
- **address**: A1 column labels and cell references
- **range**: Range expressions resolved to normalized inclusive bounds

### Document Model
- **cell**: Cell coordinates and cell records
- **document**: Documents, the sparse cell map, used range, range reads
- **schema**: Header row and category column guesses

### Mutation
- **patch**: Batched cell edits applied as one transaction per document
- **realtime**: Fire-and-forget notification of applied edits

### Access and Storage
- **users**: Users that documents can be shared with
- **access**: Roles, shares and the accessible-document listing
- **store**: Per-document locking, versioned commits, persistence
- **saving**: Gzip JSON files written atomically

### Surface
- **service**: Save, list, read, schema, patch and share operations
- **config**: Limits and endpoints read from the environment
- **error**: Error taxonomy

## Concurrency

Mutations on one document are serialized by that document's lock and each
one sees every change committed before it. Mutations on different documents
run in parallel. Readers always see a fully committed version.

## Data Directory

- `documents/<id>.json.gz` - one document per file
- `shares.json` - every share
- `users.json` - every known user
- `ids.json` - next document and user ids
*/

pub mod access;
pub mod address;
pub mod cell;
pub mod config;
pub mod document;
pub mod error;
pub mod patch;
pub mod range;
pub mod realtime;
pub mod saving;
pub mod schema;
pub mod service;
pub mod store;
pub mod users;

pub use access::{AccessibleFile, Role, Share};
pub use address::{cell_name, column_label, parse_cell_ref};
pub use cell::{CellId, CellRecord};
pub use config::{Config, RealtimeConfig};
pub use document::{
    CellMap, Document, DocumentId, DocumentMeta, Projection, RangeValues, SheetState, SparseCell,
    ValueMode,
};
pub use error::{ErrorKind, Result, SheetError, StoreError};
pub use patch::{CellEdit, EditInput, PatchOutcome};
pub use range::{CellBounds, resolve_range, resolve_read_range};
pub use realtime::RealtimeNotifier;
pub use schema::{SheetSchema, infer_schema};
pub use service::FileService;
pub use store::{DocumentStore, SheetStore};
pub use users::{User, UserId};
