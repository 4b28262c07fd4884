//! The portal's state behind one handle: typed store, clock and upload root.
//!
//! Handlers go through [`Library`] so that every lifecycle action is checked
//! against the session and lands in the audit log.

use crate::audit::{self, Page, PageSize};
use crate::documents;
use crate::folders::{self, FolderError, FolderListing};
use crate::notifications::{self, NotificationDraft};
use crate::ports::{KeyValueStore, TimeProvider};
use crate::seed::SeedFile;
use crate::store::{Store, StoreError};
use crate::trash::{self, BulkOutcome, TrashOutcome};
use crate::types::audit::AuditEntry;
use crate::types::documents::{Document, DocumentFilter, NewDocument};
use crate::types::folders::{Folder, NewFolder};
use crate::types::notifications::{Notification, NotificationAction, NotificationFilter};
use crate::types::users::{NewUser, Session, UserSummary};
use crate::uploads::{self, UploadError};
use crate::users::{self, UserError};

use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("a folder is required")]
    MissingFolder,
    #[error("not permitted")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Folder(#[from] FolderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to export audit log: {0}")]
    Export(#[from] csv::Error),
}

/// A file plus the metadata typed into the upload form.
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub title: Option<String>,
    pub doc_type: String,
    pub folder: String,
    pub recipient: Option<String>,
    pub message: String,
}

pub struct Library<K, T> {
    store: Store<K>,
    time: T,
    uploads_root: PathBuf,
}

impl<K: KeyValueStore, T: TimeProvider> Library<K, T> {
    pub fn new(backend: K, time: T, uploads_root: impl Into<PathBuf>) -> Self {
        Self {
            store: Store::new(backend),
            time,
            uploads_root: uploads_root.into(),
        }
    }

    pub fn store(&self) -> &Store<K> {
        &self.store
    }

    pub fn now(&self) -> OffsetDateTime {
        self.time.now()
    }

    /// Seeds users and folders, each only if nothing is stored under its key yet.
    pub fn apply_seed(&self, seed: &SeedFile) -> Result<(), StoreError> {
        if users::seed(&self.store, seed.users(self.now()))? {
            info!(count = seed.users.len(), "users seeded");
        }
        if folders::seed(&self.store, seed.folders())? {
            info!(count = seed.folders.len(), "folders seeded");
        }
        Ok(())
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<Session>, StoreError> {
        let session = users::authenticate(&self.store, email, password)?;
        if let Some(session) = &session {
            self.audit(session, "Signed in", &session.email)?;
        }
        Ok(session)
    }

    pub fn session_for(&self, email: &str) -> Result<Option<Session>, StoreError> {
        users::session_for(&self.store, email)
    }

    pub fn upload(&self, session: &Session, request: UploadRequest) -> Result<Document, LibraryError> {
        let folder = request.folder.trim();
        if folder.is_empty() {
            return Err(LibraryError::MissingFolder);
        }
        if let Some(existing) = self.find_folder(folder)?
            && !folders::can_open(session, &existing)
        {
            return Err(LibraryError::Forbidden);
        }

        let now = self.now();
        let stored = uploads::store_upload(
            &self.uploads_root,
            &request.bytes,
            request.content_type.as_deref(),
            request.filename.as_deref(),
            now,
        )?;
        let title = request
            .title
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or(request.filename)
            .unwrap_or_else(|| "Untitled".to_string());

        let doc = documents::create(
            &self.store,
            NewDocument {
                title,
                file_ref: stored.rel_path,
                doc_type: request.doc_type.trim().to_string(),
                folder: folder.to_string(),
                recipient: request.recipient,
                message: request.message,
            },
            &session.role,
            now,
        )?;
        notifications::push(
            &self.store,
            NotificationDraft {
                recipient: None,
                title: format!("New document uploaded: {}", doc.title),
                sender: &session.email,
                action: NotificationAction::None,
                doc_id: Some(&doc.id),
            },
            now,
        )?;
        self.audit(session, "Uploaded document", &doc.title)?;
        info!(doc_id = %doc.id, folder = %doc.folder, by = %session.email, "document uploaded");
        Ok(doc)
    }

    /// Registry listing narrowed to what the viewer may see.
    pub fn documents(
        &self,
        session: &Session,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, StoreError> {
        let known = folders::load(&self.store)?;
        Ok(documents::list(&self.store, filter)?
            .into_iter()
            .filter(|doc| may_view(session, doc, &known))
            .collect())
    }

    pub fn inbox(&self, session: &Session) -> Result<Vec<Document>, StoreError> {
        documents::inbox(&self.store, session)
    }

    pub fn outbox(&self, session: &Session) -> Result<Vec<Document>, StoreError> {
        documents::outbox(&self.store, session)
    }

    /// Finds the stored file behind a live document the viewer may open.
    pub fn document_file(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<(Document, PathBuf), LibraryError> {
        let doc = documents::get(&self.store, id)?.ok_or(LibraryError::NotFound)?;
        let known = folders::load(&self.store)?;
        if !may_view(session, &doc, &known) {
            return Err(LibraryError::Forbidden);
        }
        let path = uploads::resolve_file_path(&self.uploads_root, &doc.file_ref)?;
        Ok((doc, path))
    }

    pub fn request_trash(&self, session: &Session, id: &str) -> Result<TrashOutcome, StoreError> {
        let outcome = trash::request(&self.store, id, session, self.now())?;
        self.audit_outcome(session, "Moved to trash", &outcome)?;
        Ok(outcome)
    }

    pub fn trash(&self, session: &Session) -> Result<Vec<Document>, StoreError> {
        trash::list_for(&self.store, session, self.now())
    }

    pub fn approve_trash(&self, session: &Session, id: &str) -> Result<TrashOutcome, StoreError> {
        let outcome = trash::approve(&self.store, id, session, self.now())?;
        self.audit_outcome(session, "Approved deletion", &outcome)?;
        Ok(outcome)
    }

    pub fn reject_trash(&self, session: &Session, id: &str) -> Result<TrashOutcome, StoreError> {
        let outcome = trash::reject(&self.store, id, session, self.now())?;
        self.audit_outcome(session, "Rejected deletion", &outcome)?;
        Ok(outcome)
    }

    pub fn restore(&self, session: &Session, id: &str) -> Result<TrashOutcome, StoreError> {
        let outcome = trash::restore(&self.store, id, session, self.now())?;
        self.audit_outcome(session, "Restored document", &outcome)?;
        Ok(outcome)
    }

    pub fn delete_permanently(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<TrashOutcome, StoreError> {
        let outcome = trash::permanently_delete(&self.store, id, session, self.now())?;
        if let TrashOutcome::Applied(doc) = &outcome {
            self.discard_file(doc);
        }
        self.audit_outcome(session, "Permanently deleted", &outcome)?;
        Ok(outcome)
    }

    pub fn restore_many(&self, session: &Session, ids: &[String]) -> Result<BulkOutcome, StoreError> {
        let outcome = trash::restore_many(&self.store, ids, session, self.now())?;
        if !outcome.applied.is_empty() {
            let target = format!("{} documents", outcome.applied.len());
            self.audit(session, "Restored documents", &target)?;
        }
        Ok(outcome)
    }

    pub fn delete_many(
        &self,
        session: &Session,
        ids: &[String],
    ) -> Result<Result<BulkOutcome, TrashOutcome>, StoreError> {
        let before = trash::load_current(&self.store, self.now())?;
        let outcome = trash::delete_many(&self.store, ids, session, self.now())?;
        if let Ok(bulk) = &outcome
            && !bulk.applied.is_empty()
        {
            before
                .iter()
                .filter(|doc| bulk.applied.contains(&doc.id))
                .for_each(|doc| self.discard_file(doc));
            let target = format!("{} documents", bulk.applied.len());
            self.audit(session, "Permanently deleted", &target)?;
        }
        Ok(outcome)
    }

    pub fn empty_trash(&self, session: &Session) -> Result<Result<usize, TrashOutcome>, StoreError> {
        let before = trash::load_current(&self.store, self.now())?;
        let outcome = trash::empty(&self.store, session, self.now())?;
        if let Ok(removed) = &outcome
            && *removed > 0
        {
            before
                .iter()
                .filter(|doc| !doc.pending_approval)
                .for_each(|doc| self.discard_file(doc));
            self.audit(session, "Emptied trash", &format!("{removed} documents"))?;
        }
        Ok(outcome)
    }

    pub fn notifications(
        &self,
        session: &Session,
        filter: NotificationFilter,
        search: Option<&str>,
    ) -> Result<Vec<Notification>, StoreError> {
        notifications::list_for(&self.store, session, filter, search, self.now())
    }

    pub fn unread_count(&self, session: &Session) -> Result<usize, StoreError> {
        notifications::unread_count(&self.store, session, self.now())
    }

    pub fn mark_read(&self, session: &Session, id: &str) -> Result<bool, StoreError> {
        notifications::mark_read(&self.store, id, session)
    }

    pub fn mark_all_read(&self, session: &Session) -> Result<usize, StoreError> {
        notifications::mark_all_read(&self.store, session, self.now())
    }

    pub fn delete_notification(&self, session: &Session, id: &str) -> Result<bool, StoreError> {
        notifications::delete(&self.store, id, session)
    }

    pub fn delete_all_notifications(&self, session: &Session) -> Result<usize, LibraryError> {
        if !session.is_admin() {
            return Err(LibraryError::Forbidden);
        }
        Ok(notifications::delete_all_visible(
            &self.store,
            session,
            self.now(),
        )?)
    }

    pub fn folders(
        &self,
        session: &Session,
        search: Option<&str>,
    ) -> Result<Vec<FolderListing>, StoreError> {
        folders::visible_for(&self.store, session, search)
    }

    pub fn create_folder(&self, session: &Session, new: NewFolder) -> Result<Folder, LibraryError> {
        let folder = folders::create(&self.store, new, session)?;
        self.audit(session, "Created folder", &folder.name)?;
        Ok(folder)
    }

    pub fn users(
        &self,
        session: &Session,
        search: Option<&str>,
    ) -> Result<Vec<UserSummary>, LibraryError> {
        if !session.is_admin() {
            return Err(LibraryError::Forbidden);
        }
        Ok(users::list(&self.store, search)?)
    }

    pub fn create_user(&self, session: &Session, new: NewUser) -> Result<UserSummary, LibraryError> {
        let user = users::admin_create(&self.store, new, session, self.now())?;
        self.audit(session, "Created user", &user.email)?;
        Ok(user)
    }

    pub fn toggle_user(&self, session: &Session, email: &str) -> Result<UserSummary, LibraryError> {
        let user =
            users::toggle_status(&self.store, email, session)?.ok_or(LibraryError::NotFound)?;
        let action = format!("Set user {}", user.status.label());
        self.audit(session, &action, &user.email)?;
        Ok(user)
    }

    pub fn delete_user(&self, session: &Session, email: &str) -> Result<(), LibraryError> {
        if session.email.eq_ignore_ascii_case(email) {
            return Err(LibraryError::Forbidden);
        }
        if !users::delete(&self.store, email, session)? {
            return Err(LibraryError::NotFound);
        }
        self.audit(session, "Deleted user", email)?;
        Ok(())
    }

    pub fn audit_logs(
        &self,
        session: &Session,
        search: Option<&str>,
        page: usize,
        size: PageSize,
    ) -> Result<Page<AuditEntry>, LibraryError> {
        if !session.is_admin() {
            return Err(LibraryError::Forbidden);
        }
        Ok(audit::list(&self.store, search, page, size)?)
    }

    pub fn audit_csv(&self, session: &Session, search: Option<&str>) -> Result<String, LibraryError> {
        if !session.is_admin() {
            return Err(LibraryError::Forbidden);
        }
        Ok(audit::to_csv(&audit::search(&self.store, search)?)?)
    }

    fn find_folder(&self, name: &str) -> Result<Option<Folder>, StoreError> {
        Ok(folders::load(&self.store)?
            .into_iter()
            .find(|folder| folder.name == name))
    }

    fn audit(&self, session: &Session, action: &str, target: &str) -> Result<(), StoreError> {
        audit::record(&self.store, &session.email, action, target, self.now()).map(|_| ())
    }

    fn audit_outcome(
        &self,
        session: &Session,
        action: &str,
        outcome: &TrashOutcome,
    ) -> Result<(), StoreError> {
        match outcome {
            TrashOutcome::Applied(doc) => self.audit(session, action, &doc.title),
            _ => Ok(()),
        }
    }

    /// Best effort. A file that cannot be removed is logged and left behind.
    fn discard_file(&self, doc: &Document) {
        match uploads::resolve_file_path(&self.uploads_root, &doc.file_ref) {
            Ok(path) => {
                if let Err(err) = std::fs::remove_file(&path) {
                    warn!(doc_id = %doc.id, error = %err, "failed to remove stored file");
                }
            }
            Err(UploadError::NotFound) => {}
            Err(err) => {
                warn!(doc_id = %doc.id, error = %err, "failed to resolve stored file");
            }
        }
    }
}

/// Admins, the sender, the recipient and anyone who can open the folder.
fn may_view(session: &Session, doc: &Document, known: &[Folder]) -> bool {
    if session.is_admin()
        || session.answers_to(&doc.sender)
        || doc
            .recipient
            .as_deref()
            .is_some_and(|recipient| session.answers_to(recipient))
    {
        return true;
    }
    match known.iter().find(|folder| folder.name == doc.folder) {
        Some(folder) => folders::can_open(session, folder),
        None => true,
    }
}
