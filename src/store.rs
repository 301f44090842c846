//! Persistence boundary for documents, shares and users.
//!
//! Every document lives in its own slot with two locks:
//!
//! * `write` is held for the whole of a mutation (save, patch, delete), so
//!   at most one mutation per document is in flight. Mutations on different
//!   documents never share a lock.
//! * `current` guards only the pointer to the last committed version. Readers
//!   clone that pointer and never wait for a mutation's I/O.
//!
//! A mutation works on a copy and swaps it in after it has been persisted,
//! so a failure at any step leaves the committed version untouched.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::access::Share;
use crate::document::{Document, DocumentId, DocumentMeta, SheetState};
use crate::error::{Result, SheetError, StoreError};
use crate::saving;
use crate::users::{self, User, UserId};

const DOCUMENTS_DIR: &str = "documents";
const SHARES_FILE: &str = "shares.json";
const USERS_FILE: &str = "users.json";
const IDS_FILE: &str = "ids.json";

/// Storage handle passed explicitly to the engine and the service.
pub trait DocumentStore: Send + Sync {
    /// Last committed version of a document.
    fn load(&self, id: DocumentId) -> Result<Option<Document>>;

    fn meta(&self, id: DocumentId) -> Result<Option<DocumentMeta>>;

    fn list_owned(&self, owner: UserId) -> Result<Vec<DocumentMeta>>;

    fn create(&self, owner: UserId, name: &str, state: SheetState) -> Result<Document>;

    /// Runs `mutate` on a copy of the document while holding its exclusive
    /// lock, refreshes `updated_at` and persists the result.
    ///
    /// Nothing is committed if `mutate` or the write fails. `id`, `owner_id`
    /// and `created_at` cannot be changed through this call.
    fn update(
        &self,
        id: DocumentId,
        mutate: &mut dyn FnMut(&mut Document) -> Result<()>,
    ) -> Result<Document>;

    /// Removes a document and every share on it. `false` if it did not exist.
    fn delete(&self, id: DocumentId) -> Result<bool>;

    fn share(&self, document: DocumentId, user: UserId) -> Result<Option<Share>>;

    fn shares_for_document(&self, document: DocumentId) -> Result<Vec<Share>>;

    fn shares_for_user(&self, user: UserId) -> Result<Vec<Share>>;

    /// Creates the share or overwrites the role of the existing one.
    fn upsert_share(&self, document: DocumentId, user: UserId, role: &str) -> Result<Share>;

    fn delete_share(&self, document: DocumentId, user: UserId) -> Result<bool>;

    fn register_user(&self, name: &str, email: &str) -> Result<User>;

    fn user(&self, id: UserId) -> Result<Option<User>>;

    /// Case-insensitive, whitespace-trimmed lookup.
    fn user_by_email(&self, email: &str) -> Result<Option<User>>;
}

struct Slot {
    write: Mutex<()>,
    current: RwLock<Option<Arc<Document>>>,
}

impl Slot {
    fn new(document: Document) -> Self {
        Slot {
            write: Mutex::new(()),
            current: RwLock::new(Some(Arc::new(document))),
        }
    }

    fn snapshot(&self) -> Result<Option<Arc<Document>>> {
        Ok(self.current.read()?.clone())
    }
}

/// Next ids to hand out. Persisted so that ids of deleted or unreadable
/// documents are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct IdCounters {
    next_document_id: DocumentId,
    next_user_id: UserId,
}

impl Default for IdCounters {
    fn default() -> Self {
        IdCounters {
            next_document_id: 1,
            next_user_id: 1,
        }
    }
}

/// In-memory document store, optionally mirrored to a data directory.
pub struct SheetStore {
    root: Option<PathBuf>,
    ids: Mutex<IdCounters>,
    documents: RwLock<HashMap<DocumentId, Arc<Slot>>>,
    shares: RwLock<BTreeMap<(DocumentId, UserId), Share>>,
    users: RwLock<BTreeMap<UserId, User>>,
}

impl SheetStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        SheetStore {
            root: None,
            ids: Mutex::new(IdCounters::default()),
            documents: RwLock::new(HashMap::new()),
            shares: RwLock::new(BTreeMap::new()),
            users: RwLock::new(BTreeMap::new()),
        }
    }

    /// Opens (creating if needed) a data directory and loads everything in it.
    ///
    /// Document files that cannot be decoded are skipped with a warning, and
    /// so are shares on documents that did not load. New ids start above
    /// every id seen in the directory, loaded or not.
    ///
    /// # Errors
    /// * Returns an error if the directory cannot be created or listed
    /// * Returns an error if the share or user index exists but cannot be read
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let documents_dir = root.join(DOCUMENTS_DIR);
        create_dir_all(&documents_dir).map_err(StoreError::from)?;

        let mut documents = HashMap::new();
        let mut max_document_id = 0;
        for entry in fs::read_dir(&documents_dir).map_err(StoreError::from)?.flatten() {
            let path = entry.path();
            let Some(stem) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(".json.gz"))
            else {
                continue;
            };
            if let Ok(file_id) = stem.parse::<DocumentId>() {
                max_document_id = max_document_id.max(file_id);
            }
            match saving::load_gz_json::<Document>(&path) {
                Ok(document) => {
                    max_document_id = max_document_id.max(document.id);
                    documents.insert(document.id, Arc::new(Slot::new(document)));
                }
                Err(e) => warn!("skipping unreadable document {}: {}", path.display(), e),
            }
        }

        let stored_shares: Vec<Share> = load_index(&root.join(SHARES_FILE))?;
        let users: Vec<User> = load_index(&root.join(USERS_FILE))?;
        let max_user_id = users.iter().map(|u| u.id).max().unwrap_or(0);
        max_document_id = stored_shares
            .iter()
            .map(|s| s.document_id)
            .fold(max_document_id, DocumentId::max);

        let (shares, orphaned): (Vec<Share>, Vec<Share>) = stored_shares
            .into_iter()
            .partition(|s| documents.contains_key(&s.document_id));
        for share in &orphaned {
            warn!(
                "ignoring share of missing document {} with user {}",
                share.document_id, share.user_id
            );
        }

        let stored_ids = load_ids(&root.join(IDS_FILE))?.unwrap_or_default();
        let ids = IdCounters {
            next_document_id: stored_ids.next_document_id.max(max_document_id + 1),
            next_user_id: stored_ids.next_user_id.max(max_user_id + 1),
        };

        info!(
            "opened data directory {} ({} documents, {} shares, {} users)",
            root.display(),
            documents.len(),
            shares.len(),
            users.len()
        );

        Ok(SheetStore {
            root: Some(root),
            ids: Mutex::new(ids),
            documents: RwLock::new(documents),
            shares: RwLock::new(
                shares
                    .into_iter()
                    .map(|s| ((s.document_id, s.user_id), s))
                    .collect(),
            ),
            users: RwLock::new(users.into_iter().map(|u| (u.id, u)).collect()),
        })
    }

    fn slot(&self, id: DocumentId) -> Result<Option<Arc<Slot>>> {
        Ok(self.documents.read()?.get(&id).cloned())
    }

    fn document_path(&self, id: DocumentId) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(DOCUMENTS_DIR).join(format!("{id}.json.gz")))
    }

    fn persist_document(&self, document: &Document) -> Result<()> {
        if let Some(path) = self.document_path(document.id) {
            saving::save_gz_json(document, &path)?;
        }
        Ok(())
    }

    fn persist_shares(&self, shares: &BTreeMap<(DocumentId, UserId), Share>) -> Result<()> {
        if let Some(root) = &self.root {
            let list: Vec<&Share> = shares.values().collect();
            saving::save_json(&list, &root.join(SHARES_FILE))?;
        }
        Ok(())
    }

    fn persist_ids(&self, ids: &IdCounters) -> Result<()> {
        if let Some(root) = &self.root {
            saving::save_json(ids, &root.join(IDS_FILE))?;
        }
        Ok(())
    }

    /// Takes the next id from `counter`. The advanced counter is persisted
    /// before the id is handed out.
    fn reserve_id(&self, counter: fn(&mut IdCounters) -> &mut u64) -> Result<u64> {
        let mut ids = self.ids.lock()?;
        let mut next = *ids;
        let id = *counter(&mut next);
        *counter(&mut next) = id + 1;
        self.persist_ids(&next)?;
        *ids = next;
        Ok(id)
    }

    fn persist_users(&self, users: &BTreeMap<UserId, User>) -> Result<()> {
        if let Some(root) = &self.root {
            let list: Vec<&User> = users.values().collect();
            saving::save_json(&list, &root.join(USERS_FILE))?;
        }
        Ok(())
    }

    /// [`DocumentStore::update`] with an explicit commit timestamp.
    pub fn update_with_timestamp(
        &self,
        id: DocumentId,
        updated_at: DateTime<Utc>,
        mutate: &mut dyn FnMut(&mut Document) -> Result<()>,
    ) -> Result<Document> {
        let slot = self.slot(id)?.ok_or(SheetError::NotFound)?;
        // A panic inside an earlier mutation never reached the swap below, so
        // the committed version is still consistent.
        let _write = slot.write.lock().unwrap_or_else(PoisonError::into_inner);

        let current = slot.snapshot()?.ok_or(SheetError::NotFound)?;
        let mut next = (*current).clone();
        mutate(&mut next)?;
        next.id = current.id;
        next.owner_id = current.owner_id;
        next.created_at = current.created_at;
        next.updated_at = updated_at;

        self.persist_document(&next)?;
        let next = Arc::new(next);
        *slot.current.write()? = Some(Arc::clone(&next));
        Ok((*next).clone())
    }

    fn write_share(&self, document: DocumentId, user: UserId, role: &str) -> Result<Share> {
        let mut shares = self.shares.write()?;
        let now = Utc::now();
        let share = match shares.get(&(document, user)) {
            Some(existing) => Share {
                role: role.to_string(),
                updated_at: now,
                ..existing.clone()
            },
            None => Share {
                document_id: document,
                user_id: user,
                role: role.to_string(),
                created_at: now,
                updated_at: now,
            },
        };
        let mut next = shares.clone();
        next.insert((document, user), share.clone());
        self.persist_shares(&next)?;
        *shares = next;
        Ok(share)
    }

    #[cfg(test)]
    pub(crate) fn insert_share_unchecked(
        &self,
        document: DocumentId,
        user: UserId,
        role: &str,
    ) -> Result<Share> {
        self.write_share(document, user, role)
    }
}

fn load_ids(path: &Path) -> Result<Option<IdCounters>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(saving::load_json(path)?))
}

fn load_index<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(saving::load_json(path)?)
}

impl DocumentStore for SheetStore {
    fn load(&self, id: DocumentId) -> Result<Option<Document>> {
        let snapshot = match self.slot(id)? {
            Some(slot) => slot.snapshot()?,
            None => None,
        };
        Ok(snapshot.map(|doc| (*doc).clone()))
    }

    fn meta(&self, id: DocumentId) -> Result<Option<DocumentMeta>> {
        let snapshot = match self.slot(id)? {
            Some(slot) => slot.snapshot()?,
            None => None,
        };
        Ok(snapshot.map(|doc| doc.meta()))
    }

    fn list_owned(&self, owner: UserId) -> Result<Vec<DocumentMeta>> {
        let slots: Vec<Arc<Slot>> = self.documents.read()?.values().cloned().collect();
        let mut metas = Vec::new();
        for slot in slots {
            if let Some(doc) = slot.snapshot()? {
                if doc.owner_id == owner {
                    metas.push(doc.meta());
                }
            }
        }
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
        Ok(metas)
    }

    fn create(&self, owner: UserId, name: &str, state: SheetState) -> Result<Document> {
        let id = self.reserve_id(|ids| &mut ids.next_document_id)?;
        let now = Utc::now();
        let document = Document {
            id,
            owner_id: owner,
            name: name.to_string(),
            state,
            created_at: now,
            updated_at: now,
        };
        self.persist_document(&document)?;
        self.documents
            .write()?
            .insert(document.id, Arc::new(Slot::new(document.clone())));
        info!("created document {} for user {}", document.id, owner);
        Ok(document)
    }

    fn update(
        &self,
        id: DocumentId,
        mutate: &mut dyn FnMut(&mut Document) -> Result<()>,
    ) -> Result<Document> {
        self.update_with_timestamp(id, Utc::now(), mutate)
    }

    fn delete(&self, id: DocumentId) -> Result<bool> {
        let Some(slot) = self.slot(id)? else {
            return Ok(false);
        };
        let _write = slot.write.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.snapshot()?.is_none() {
            return Ok(false);
        }

        // Shares are dropped on disk before the document file goes away, so a
        // failure never leaves a share pointing at a missing document.
        let mut shares = self.shares.write()?;
        let mut next = shares.clone();
        next.retain(|(document, _), _| *document != id);
        let removed = shares.len() - next.len();
        if removed > 0 {
            self.persist_shares(&next)?;
        }

        if let Some(path) = self.document_path(id) {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    if removed > 0 {
                        if let Err(restore) = self.persist_shares(&shares) {
                            warn!("failed to restore shares of document {}: {}", id, restore);
                        }
                    }
                    return Err(StoreError::from(e).into());
                }
            }
        }

        *shares = next;
        drop(shares);
        *slot.current.write()? = None;
        self.documents.write()?.remove(&id);
        info!("deleted document {} and {} shares", id, removed);
        Ok(true)
    }

    fn share(&self, document: DocumentId, user: UserId) -> Result<Option<Share>> {
        Ok(self.shares.read()?.get(&(document, user)).cloned())
    }

    fn shares_for_document(&self, document: DocumentId) -> Result<Vec<Share>> {
        let mut shares: Vec<Share> = self
            .shares
            .read()?
            .values()
            .filter(|s| s.document_id == document)
            .cloned()
            .collect();
        shares.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.user_id.cmp(&b.user_id)));
        Ok(shares)
    }

    fn shares_for_user(&self, user: UserId) -> Result<Vec<Share>> {
        Ok(self
            .shares
            .read()?
            .values()
            .filter(|s| s.user_id == user)
            .cloned()
            .collect())
    }

    fn upsert_share(&self, document: DocumentId, user: UserId, role: &str) -> Result<Share> {
        let slot = self.slot(document)?.ok_or(SheetError::NotFound)?;
        // Held until the share is written; a concurrent delete either runs
        // first (NotFound here) or sees the share and removes it.
        let _write = slot.write.lock().unwrap_or_else(PoisonError::into_inner);
        let owner = slot.snapshot()?.ok_or(SheetError::NotFound)?.owner_id;
        if owner == user {
            return Err(StoreError::Conflict("cannot share a document with its owner".into()).into());
        }
        let share = self.write_share(document, user, role)?;
        info!("document {} shared with user {} as {}", document, user, role);
        Ok(share)
    }

    fn delete_share(&self, document: DocumentId, user: UserId) -> Result<bool> {
        let mut shares = self.shares.write()?;
        if !shares.contains_key(&(document, user)) {
            return Ok(false);
        }
        let mut next = shares.clone();
        next.remove(&(document, user));
        self.persist_shares(&next)?;
        *shares = next;
        info!("document {} unshared from user {}", document, user);
        Ok(true)
    }

    fn register_user(&self, name: &str, email: &str) -> Result<User> {
        users::validate_registration(name, email)?;
        let mut all = self.users.write()?;
        let normalized = users::normalize_email(email);
        if all.values().any(|u| users::normalize_email(&u.email) == normalized) {
            return Err(StoreError::Conflict("email address is already registered".into()).into());
        }

        let user = User {
            id: self.reserve_id(|ids| &mut ids.next_user_id)?,
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            created_at: Utc::now(),
        };
        let mut next = all.clone();
        next.insert(user.id, user.clone());
        self.persist_users(&next)?;
        *all = next;
        Ok(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read()?.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let normalized = users::normalize_email(email);
        Ok(self
            .users
            .read()?
            .values()
            .find(|u| users::normalize_email(&u.email) == normalized)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellId, CellRecord};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn state_with(value: &str) -> SheetState {
        let mut state = SheetState::default();
        state.data.insert(CellId::new(0, 0), CellRecord::with_value(value));
        state
    }

    #[test]
    fn create_then_load() {
        let store = SheetStore::in_memory();
        let doc = store.create(7, "Budget", state_with("x")).unwrap();

        let loaded = store.load(doc.id).unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(store.load(doc.id + 1).unwrap().is_none());
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let store = SheetStore::in_memory();
        let a = store.create(1, "a", SheetState::default()).unwrap();
        let b = store.create(1, "b", SheetState::default()).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn update_keeps_immutable_fields() {
        let store = SheetStore::in_memory();
        let doc = store.create(7, "Budget", SheetState::default()).unwrap();

        let updated = store
            .update(doc.id, &mut |d| {
                d.id = 999;
                d.owner_id = 999;
                d.name = "Renamed".into();
                Ok(())
            })
            .unwrap();

        assert_eq!(updated.id, doc.id);
        assert_eq!(updated.owner_id, 7);
        assert_eq!(updated.created_at, doc.created_at);
        assert_eq!(updated.name, "Renamed");
        assert!(updated.updated_at >= doc.updated_at);
    }

    #[test]
    fn failed_mutation_commits_nothing() {
        let store = SheetStore::in_memory();
        let doc = store.create(7, "Budget", state_with("before")).unwrap();

        let err = store
            .update(doc.id, &mut |d| {
                d.state = state_with("after");
                Err(SheetError::validation("boom"))
            })
            .unwrap_err();
        assert!(matches!(err, SheetError::Validation(_)));
        assert_eq!(store.load(doc.id).unwrap().unwrap(), doc);
    }

    #[test]
    fn update_of_missing_document_is_not_found() {
        let store = SheetStore::in_memory();
        let err = store.update(42, &mut |_| Ok(())).unwrap_err();
        assert!(matches!(err, SheetError::NotFound));
    }

    #[test]
    fn delete_cascades_shares() {
        let store = SheetStore::in_memory();
        let doc = store.create(1, "Budget", SheetState::default()).unwrap();
        let kept = store.create(1, "Other", SheetState::default()).unwrap();
        store.upsert_share(doc.id, 2, "viewer").unwrap();
        store.upsert_share(kept.id, 2, "viewer").unwrap();

        assert!(store.delete(doc.id).unwrap());
        assert!(!store.delete(doc.id).unwrap());
        assert!(store.load(doc.id).unwrap().is_none());
        assert!(store.share(doc.id, 2).unwrap().is_none());
        assert_eq!(store.shares_for_user(2).unwrap().len(), 1);
    }

    #[test]
    fn share_upsert_overwrites_role() {
        let store = SheetStore::in_memory();
        let doc = store.create(1, "Budget", SheetState::default()).unwrap();

        let first = store.upsert_share(doc.id, 2, "viewer").unwrap();
        let second = store.upsert_share(doc.id, 2, "editor").unwrap();

        assert_eq!(second.role, "editor");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.shares_for_document(doc.id).unwrap().len(), 1);
    }

    #[test]
    fn cannot_share_with_owner_or_missing_document() {
        let store = SheetStore::in_memory();
        let doc = store.create(1, "Budget", SheetState::default()).unwrap();

        assert!(matches!(
            store.upsert_share(doc.id, 1, "editor"),
            Err(SheetError::Storage(StoreError::Conflict(_)))
        ));
        assert!(matches!(
            store.upsert_share(doc.id + 1, 2, "editor"),
            Err(SheetError::NotFound)
        ));
    }

    #[test]
    fn delete_share_reports_absence() {
        let store = SheetStore::in_memory();
        let doc = store.create(1, "Budget", SheetState::default()).unwrap();
        store.upsert_share(doc.id, 2, "viewer").unwrap();

        assert!(store.delete_share(doc.id, 2).unwrap());
        assert!(!store.delete_share(doc.id, 2).unwrap());
    }

    #[test]
    fn users_are_unique_by_email() {
        let store = SheetStore::in_memory();
        let ada = store.register_user("Ada", "ada@example.com").unwrap();

        assert!(matches!(
            store.register_user("Other Ada", " ADA@example.com "),
            Err(SheetError::Storage(StoreError::Conflict(_)))
        ));
        assert_eq!(store.user_by_email("Ada@Example.com").unwrap(), Some(ada.clone()));
        assert_eq!(store.user(ada.id).unwrap(), Some(ada));
    }

    #[test]
    fn data_directory_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (doc, ada) = {
            let store = SheetStore::open(dir.path()).unwrap();
            let ada = store.register_user("Ada", "ada@example.com").unwrap();
            let mut state = state_with("kept");
            state.extra.insert("frozen".into(), json!(2));
            let doc = store.create(1, "Budget", state).unwrap();
            store.upsert_share(doc.id, ada.id, "editor").unwrap();
            (doc, ada)
        };

        let store = SheetStore::open(dir.path()).unwrap();
        assert_eq!(store.load(doc.id).unwrap(), Some(doc.clone()));
        assert_eq!(store.share(doc.id, ada.id).unwrap().unwrap().role, "editor");
        assert_eq!(store.user(ada.id).unwrap(), Some(ada));

        let next = store.create(1, "Second", SheetState::default()).unwrap();
        assert!(next.id > doc.id);
    }

    #[test]
    fn unreadable_document_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(DOCUMENTS_DIR)).unwrap();
        fs::write(dir.path().join(DOCUMENTS_DIR).join("5.json.gz"), b"garbage").unwrap();

        let store = SheetStore::open(dir.path()).unwrap();
        assert!(store.load(5).unwrap().is_none());
    }

    #[test]
    fn failed_write_leaves_committed_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = SheetStore::open(dir.path()).unwrap();
        let doc = store.create(1, "Budget", state_with("before")).unwrap();

        fs::remove_dir_all(dir.path().join(DOCUMENTS_DIR)).unwrap();
        let err = store
            .update(doc.id, &mut |d| {
                d.state = state_with("after");
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, SheetError::Storage(StoreError::Io(_))));
        assert_eq!(store.load(doc.id).unwrap(), Some(doc));
    }

    #[test]
    fn failed_share_write_keeps_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = SheetStore::open(dir.path()).unwrap();
        let doc = store.create(1, "Budget", state_with("kept")).unwrap();
        store.upsert_share(doc.id, 2, "viewer").unwrap();

        let shares_path = dir.path().join(SHARES_FILE);
        fs::remove_file(&shares_path).unwrap();
        fs::create_dir(&shares_path).unwrap();

        let err = store.delete(doc.id).unwrap_err();
        assert!(matches!(err, SheetError::Storage(StoreError::Io(_))));
        assert_eq!(store.load(doc.id).unwrap(), Some(doc.clone()));
        assert_eq!(store.shares_for_document(doc.id).unwrap().len(), 1);
        assert!(store.document_path(doc.id).unwrap().exists());
    }

    #[test]
    fn reopen_never_reuses_ids_and_drops_orphan_shares() {
        let dir = tempfile::tempdir().unwrap();
        let (kept, dropped, user) = {
            let store = SheetStore::open(dir.path()).unwrap();
            let user = store.register_user("Vera", "vera@example.com").unwrap();
            let kept = store.create(99, "Kept", SheetState::default()).unwrap().id;
            let dropped = store.create(99, "Dropped", SheetState::default()).unwrap().id;
            store.upsert_share(kept, user.id, "viewer").unwrap();
            store.upsert_share(dropped, user.id, "editor").unwrap();
            (kept, dropped, user)
        };
        fs::remove_file(dir.path().join(DOCUMENTS_DIR).join(format!("{dropped}.json.gz"))).unwrap();

        let store = SheetStore::open(dir.path()).unwrap();
        let shares = store.shares_for_user(user.id).unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].document_id, kept);

        let next = store.create(99, "Fresh", SheetState::default()).unwrap().id;
        assert!(next > dropped);
        assert!(store.share(next, user.id).unwrap().is_none());

        let next_user = store.register_user("Walt", "walt@example.com").unwrap();
        assert!(next_user.id > user.id);
    }

    #[test]
    fn ids_survive_deletes_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let last = {
            let store = SheetStore::open(dir.path()).unwrap();
            store.create(1, "First", SheetState::default()).unwrap();
            let last = store.create(1, "Last", SheetState::default()).unwrap().id;
            assert!(store.delete(last).unwrap());
            last
        };
        let counters: IdCounters = saving::load_json(&dir.path().join(IDS_FILE)).unwrap();
        assert_eq!(counters.next_document_id, last + 1);

        let store = SheetStore::open(dir.path()).unwrap();
        assert_eq!(store.create(1, "Again", SheetState::default()).unwrap().id, last + 1);
    }
}
