//! Who may do what with a document.
//!
//! Ownership is checked first; an explicit share is consulted only for
//! documents the user does not own. The role policy itself (which role may
//! patch, delete or manage shares) is applied by the caller through the
//! predicates on [`Role`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::document::{Document, DocumentId};
use crate::error::{Result, SheetError};
use crate::store::DocumentStore;
use crate::users::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    /// May replace or patch the document's content.
    pub fn can_edit(self) -> bool {
        matches!(self, Role::Owner | Role::Editor)
    }

    /// May delete the document and manage its shares.
    pub fn can_manage(self) -> bool {
        self == Role::Owner
    }
}

/// A non-owner's access to a document.
///
/// `role` is kept exactly as stored; [`normalize_stored_role`] interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored share role -> effective role. Anything unrecognized reads as viewer.
pub fn normalize_stored_role(role: &str) -> Role {
    match role.trim().to_lowercase().as_str() {
        "editor" => Role::Editor,
        _ => Role::Viewer,
    }
}

/// Role requested when creating a share. Empty means viewer; unknown values
/// are rejected rather than silently downgraded.
pub fn parse_share_role(role: &str) -> Result<Role> {
    match role.trim().to_lowercase().as_str() {
        "" | "viewer" => Ok(Role::Viewer),
        "editor" => Ok(Role::Editor),
        _ => Err(SheetError::validation("invalid role (use viewer|editor)")),
    }
}

/// Resolves `user`'s role on `document_id`.
///
/// Returns `NotFound` both when the document is missing and when the user has
/// no access, so callers cannot discover documents they cannot see.
pub fn resolve_access<S: DocumentStore + ?Sized>(
    store: &S,
    user: UserId,
    document_id: DocumentId,
) -> Result<(Document, Role)> {
    let document = store.load(document_id)?.ok_or(SheetError::NotFound)?;
    if document.owner_id == user {
        return Ok((document, Role::Owner));
    }
    match store.share(document_id, user)? {
        Some(share) => Ok((document, normalize_stored_role(&share.role))),
        None => Err(SheetError::NotFound),
    }
}

/// One row of a user's document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibleFile {
    pub id: DocumentId,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub owner_id: UserId,
    pub role: Role,
}

/// Owned documents plus documents shared with `user`, newest first.
///
/// A document appears once; ownership wins over a share. Ties on
/// `updated_at` are broken by the larger id first.
pub fn list_accessible<S: DocumentStore + ?Sized>(
    store: &S,
    user: UserId,
) -> Result<Vec<AccessibleFile>> {
    let mut files: Vec<AccessibleFile> = store
        .list_owned(user)?
        .into_iter()
        .map(|meta| AccessibleFile {
            id: meta.id,
            name: meta.name,
            updated_at: meta.updated_at,
            owner_id: meta.owner_id,
            role: Role::Owner,
        })
        .collect();
    let mut seen: HashSet<DocumentId> = files.iter().map(|f| f.id).collect();

    for share in store.shares_for_user(user)? {
        if seen.contains(&share.document_id) {
            continue;
        }
        // The document may have been deleted since the share was read.
        let Some(meta) = store.meta(share.document_id)? else {
            continue;
        };
        seen.insert(meta.id);
        files.push(AccessibleFile {
            id: meta.id,
            name: meta.name,
            updated_at: meta.updated_at,
            owner_id: meta.owner_id,
            role: normalize_stored_role(&share.role),
        });
    }

    files.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    Ok(files)
}
