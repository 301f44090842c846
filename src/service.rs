//! Document operations as a request layer sees them.
//!
//! Identity is established before these calls; every method takes the
//! caller's user id. Validation and access checks run before any lock is
//! taken, and "no access" is reported exactly like "does not exist".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::access::{self, AccessibleFile, Role};
use crate::config::Config;
use crate::document::{
    Document, DocumentId, Projection, RangeValues, SheetState, ValueMode, read_range,
};
use crate::error::{Result, SheetError};
use crate::patch::{self, EditInput};
use crate::range::{CellBounds, resolve_read_range};
use crate::realtime::RealtimeNotifier;
use crate::schema::{SheetSchema, infer_schema};
use crate::store::DocumentStore;
use crate::users::UserId;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedFile {
    pub id: DocumentId,
    pub name: String,
    pub state: SheetState,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileList {
    pub files: Vec<AccessibleFile>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileView {
    #[serde(flatten)]
    pub document: Document,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReadRequest {
    pub range: String,
    /// `grid` (default) or `sparse`
    #[serde(default)]
    pub format: Option<String>,
    /// `raw` (default) or `computed`
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellsView {
    pub file_id: DocumentId,
    /// The range expression as given, trimmed
    pub range: String,
    pub bounds: CellBounds,
    pub format: Projection,
    pub value_mode: ValueMode,
    pub values: RangeValues,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaView {
    pub file_id: DocumentId,
    pub name: String,
    #[serde(flatten)]
    pub schema: SheetSchema,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatchResult {
    pub id: DocumentId,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareCreated {
    pub file_id: DocumentId,
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareEntry {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct FileService<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    notifier: RealtimeNotifier,
    max_read_cells: u64,
    max_schema_cols: u32,
    max_patch_edits: usize,
}

impl<S: DocumentStore + ?Sized> Clone for FileService<S> {
    fn clone(&self) -> Self {
        FileService {
            store: Arc::clone(&self.store),
            notifier: self.notifier.clone(),
            max_read_cells: self.max_read_cells,
            max_schema_cols: self.max_schema_cols,
            max_patch_edits: self.max_patch_edits,
        }
    }
}

impl<S: DocumentStore + ?Sized> FileService<S> {
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        FileService {
            store,
            notifier: RealtimeNotifier::from_config(config),
            max_read_cells: config.max_read_cells,
            max_schema_cols: config.max_schema_cols,
            max_patch_edits: config.max_patch_edits,
        }
    }

    pub fn with_notifier(mut self, notifier: RealtimeNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a document, or replaces name and state of an existing one.
    ///
    /// Replacing requires the owner or editor role; the caller's role is
    /// returned either way.
    pub fn save(
        &self,
        user: UserId,
        id: Option<DocumentId>,
        name: &str,
        state: Value,
    ) -> Result<SavedFile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SheetError::validation("name is required"));
        }
        if state.is_null() {
            return Err(SheetError::validation("state is required"));
        }
        let state = SheetState::from_json(state)
            .map_err(|e| SheetError::validation(format!("invalid state: {e}")))?;

        let (document, role) = match id {
            Some(id) => {
                let (_, role) = access::resolve_access(self.store.as_ref(), user, id)?;
                if !role.can_edit() {
                    return Err(SheetError::Forbidden("read-only access"));
                }
                let mut replacement = Some(state);
                let document = self.store.update(id, &mut |doc| {
                    doc.name = name.to_string();
                    if let Some(state) = replacement.take() {
                        doc.state = state;
                    }
                    Ok(())
                })?;
                (document, role)
            }
            None => (self.store.create(user, name, state)?, Role::Owner),
        };

        Ok(SavedFile {
            id: document.id,
            name: document.name,
            state: document.state,
            role,
        })
    }

    /// Changes only the name (and `updated_at`).
    pub fn rename(&self, user: UserId, id: DocumentId, name: &str) -> Result<FileView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SheetError::validation("name is required"));
        }
        let (_, role) = access::resolve_access(self.store.as_ref(), user, id)?;
        if !role.can_edit() {
            return Err(SheetError::Forbidden("read-only access"));
        }
        let document = self.store.update(id, &mut |doc| {
            doc.name = name.to_string();
            Ok(())
        })?;
        Ok(FileView { document, role })
    }

    /// One page of the caller's owned and shared documents, newest first.
    ///
    /// `page` defaults to 1; `limit` defaults to 50 and must be within 1..=100,
    /// otherwise the default is used.
    pub fn list(&self, user: UserId, page: Option<u32>, limit: Option<u32>) -> Result<FileList> {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let files = access::list_accessible(self.store.as_ref(), user)?;
        let total = files.len() as u64;
        let start = ((page as u64 - 1) * limit as u64).min(total) as usize;
        let end = (start + limit as usize).min(files.len());

        Ok(FileList {
            files: files[start..end].to_vec(),
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: total.div_ceil(limit as u64),
            },
        })
    }

    pub fn get(&self, user: UserId, id: DocumentId) -> Result<FileView> {
        let (document, role) = access::resolve_access(self.store.as_ref(), user, id)?;
        Ok(FileView { document, role })
    }

    pub fn delete(&self, user: UserId, id: DocumentId) -> Result<()> {
        let (_, role) = access::resolve_access(self.store.as_ref(), user, id)?;
        if !role.can_manage() {
            return Err(SheetError::Forbidden("only owner can delete"));
        }
        if !self.store.delete(id)? {
            return Err(SheetError::NotFound);
        }
        Ok(())
    }

    /// Reads a cell range. The range is checked against the read ceiling
    /// before the document is looked up.
    pub fn read_cells(&self, user: UserId, id: DocumentId, request: &ReadRequest) -> Result<CellsView> {
        let range = request.range.trim();
        if range.is_empty() {
            return Err(SheetError::validation("range is required (e.g. A1:D20)"));
        }
        let bounds = resolve_read_range(range, self.max_read_cells)?;
        let format = Projection::parse(request.format.as_deref());
        let value_mode = ValueMode::parse(request.value.as_deref());

        let (document, role) = access::resolve_access(self.store.as_ref(), user, id)?;
        let values = read_range(&document.state, bounds, format, value_mode);

        Ok(CellsView {
            file_id: document.id,
            range: range.to_string(),
            bounds,
            format,
            value_mode,
            values,
            role,
        })
    }

    pub fn schema(&self, user: UserId, id: DocumentId) -> Result<SchemaView> {
        let (document, role) = access::resolve_access(self.store.as_ref(), user, id)?;
        Ok(SchemaView {
            file_id: document.id,
            schema: infer_schema(&document.state, self.max_schema_cols),
            name: document.name,
            role,
        })
    }

    /// Applies a batch of cell edits, then tells the real-time service about
    /// them without waiting for it.
    pub fn patch_cells(&self, user: UserId, id: DocumentId, inputs: &[EditInput]) -> Result<PatchResult> {
        let edits = patch::resolve_edits(inputs, self.max_patch_edits)?;

        let (_, role) = access::resolve_access(self.store.as_ref(), user, id)?;
        if !role.can_edit() {
            return Err(SheetError::Forbidden("read-only access"));
        }

        let outcome = patch::patch_document(self.store.as_ref(), id, &edits)?;
        // Detached; its outcome never affects the patch.
        let _ = self.notifier.notify_batch_edits(outcome.document.id, &edits);

        Ok(PatchResult {
            id: outcome.document.id,
            updated: outcome.applied,
        })
    }

    fn owned(&self, user: UserId, id: DocumentId) -> Result<Document> {
        let (document, role) = access::resolve_access(self.store.as_ref(), user, id)?;
        if !role.can_manage() {
            return Err(SheetError::Forbidden("only owner can manage shares"));
        }
        Ok(document)
    }

    /// Shares a document with the user registered under `email`.
    /// Sharing again with the same user replaces the role.
    pub fn create_share(
        &self,
        user: UserId,
        id: DocumentId,
        email: &str,
        role: &str,
    ) -> Result<ShareCreated> {
        let document = self.owned(user, id)?;
        let role = access::parse_share_role(role)?;
        if email.trim().is_empty() {
            return Err(SheetError::validation("email is required"));
        }

        let target = self
            .store
            .user_by_email(email)?
            .ok_or(SheetError::NotFound)?;
        if target.id == document.owner_id {
            return Err(SheetError::validation("cannot share with owner"));
        }

        self.store.upsert_share(document.id, target.id, role.as_str())?;
        Ok(ShareCreated {
            file_id: document.id,
            user_id: target.id,
            email: target.email,
            name: target.name,
            role,
            editable: role == Role::Editor,
        })
    }

    /// Shares on a document, oldest first.
    pub fn list_shares(&self, user: UserId, id: DocumentId) -> Result<Vec<ShareEntry>> {
        let document = self.owned(user, id)?;
        let mut entries = Vec::new();
        for share in self.store.shares_for_document(document.id)? {
            let Some(target) = self.store.user(share.user_id)? else {
                continue;
            };
            entries.push(ShareEntry {
                user_id: share.user_id,
                name: target.name,
                email: target.email,
                role: access::normalize_stored_role(&share.role),
                created_at: share.created_at,
                updated_at: share.updated_at,
            });
        }
        Ok(entries)
    }

    pub fn delete_share(&self, user: UserId, id: DocumentId, target: UserId) -> Result<()> {
        let document = self.owned(user, id)?;
        if !self.store.delete_share(document.id, target)? {
            return Err(SheetError::NotFound);
        }
        Ok(())
    }
}
