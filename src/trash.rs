//! Soft delete with a sender-approval gate.
//!
//! `active -> pending-trash` on request, `pending-trash -> trashed` on approval,
//! and back to `active` on reject or restore. Only approved entries can be
//! removed for good.

use crate::config::RETENTION;
use crate::documents;
use crate::notifications::{self, NotificationDraft};
use crate::ports::KeyValueStore;
use crate::store::{self, Store, StoreError};
use crate::types::documents::{Document, DocumentStatus};
use crate::types::notifications::NotificationAction;
use crate::types::users::Session;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrashOutcome {
    Applied(Document),
    NotFound,
    /// The transition is not legal from the document's current status.
    InvalidState(DocumentStatus),
    /// Permanent delete refused while the sender has not approved.
    Blocked,
    Forbidden,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Moves an active document into the trash and asks its sender to approve.
pub fn request<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    requested_by: &Session,
    now: OffsetDateTime,
) -> Result<TrashOutcome, StoreError> {
    let Some(mut doc) = documents::get(store, id)? else {
        return Ok(TrashOutcome::NotFound);
    };
    if doc.status != DocumentStatus::Active {
        warn!(doc_id = id, status = doc.status.label(), "trash request refused");
        return Ok(TrashOutcome::InvalidState(doc.status));
    }
    let may_request = requested_by.is_admin()
        || requested_by.answers_to(&doc.sender)
        || doc
            .recipient
            .as_deref()
            .is_some_and(|recipient| requested_by.answers_to(recipient));
    if !may_request {
        return Ok(TrashOutcome::Forbidden);
    }

    doc.status = DocumentStatus::PendingTrash;
    doc.pending_approval = true;
    doc.trashed_at = Some(now);

    // Trash is written before the registry drops the entry. A failed second
    // write leaves a duplicate that a retry replaces, never a lost document.
    let mut trash: Vec<Document> = store.load(store::TRASHED_DOCUMENTS)?;
    trash.retain(|entry| entry.id != doc.id);
    trash.push(doc.clone());
    store.save(store::TRASHED_DOCUMENTS, &trash)?;
    documents::take(store, id)?;

    notifications::push(
        store,
        NotificationDraft {
            recipient: Some(&doc.sender),
            title: format!("Document \"{}\" moved to Trash", doc.title),
            sender: &requested_by.email,
            action: NotificationAction::ApproveDelete,
            doc_id: Some(&doc.id),
        },
        now,
    )?;

    info!(doc_id = id, by = %requested_by.email, "trash requested");
    Ok(TrashOutcome::Applied(doc))
}

/// Loads the trash set, silently dropping approved entries past retention.
pub fn load_current<K: KeyValueStore>(
    store: &Store<K>,
    now: OffsetDateTime,
) -> Result<Vec<Document>, StoreError> {
    let trash: Vec<Document> = store.load(store::TRASHED_DOCUMENTS)?;
    let before = trash.len();
    let kept: Vec<Document> = trash.into_iter().filter(|doc| !expired(doc, now)).collect();
    if kept.len() != before {
        debug!(purged = before - kept.len(), "expired trash entries purged");
        store.save(store::TRASHED_DOCUMENTS, &kept)?;
    }
    Ok(kept)
}

/// Admins see the whole trash; everyone else sees what they sent or received.
pub fn list_for<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<Vec<Document>, StoreError> {
    let trash = load_current(store, now)?;
    if viewer.is_admin() {
        return Ok(trash);
    }
    Ok(trash
        .into_iter()
        .filter(|doc| {
            viewer.answers_to(&doc.sender)
                || doc
                    .recipient
                    .as_deref()
                    .is_some_and(|recipient| viewer.answers_to(recipient))
        })
        .collect())
}

pub fn approve<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<TrashOutcome, StoreError> {
    let mut trash = load_current(store, now)?;
    let Some(doc) = trash.iter_mut().find(|doc| doc.id == id) else {
        return Ok(TrashOutcome::NotFound);
    };
    if doc.status != DocumentStatus::PendingTrash {
        warn!(doc_id = id, status = doc.status.label(), "approval refused");
        return Ok(TrashOutcome::InvalidState(doc.status));
    }
    if !may_decide(viewer, doc) {
        return Ok(TrashOutcome::Forbidden);
    }
    doc.status = DocumentStatus::Trashed;
    doc.pending_approval = false;
    let approved = doc.clone();
    store.save(store::TRASHED_DOCUMENTS, &trash)?;
    info!(doc_id = id, by = %viewer.email, "trash approved");
    Ok(TrashOutcome::Applied(approved))
}

pub fn reject<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<TrashOutcome, StoreError> {
    move_back(store, id, viewer, DocumentStatus::PendingTrash, now)
}

pub fn restore<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<TrashOutcome, StoreError> {
    move_back(store, id, viewer, DocumentStatus::Trashed, now)
}

pub fn permanently_delete<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<TrashOutcome, StoreError> {
    let mut trash = load_current(store, now)?;
    let Some(index) = trash.iter().position(|doc| doc.id == id) else {
        return Ok(TrashOutcome::NotFound);
    };
    if !viewer.is_admin() {
        return Ok(TrashOutcome::Forbidden);
    }
    if trash[index].pending_approval {
        warn!(doc_id = id, "permanent delete blocked pending sender approval");
        return Ok(TrashOutcome::Blocked);
    }
    if trash[index].status != DocumentStatus::Trashed {
        return Ok(TrashOutcome::InvalidState(trash[index].status));
    }
    let removed = trash.remove(index);
    store.save(store::TRASHED_DOCUMENTS, &trash)?;
    info!(doc_id = id, by = %viewer.email, "document permanently deleted");
    Ok(TrashOutcome::Applied(removed))
}

/// Restores every selected entry the viewer may act on; pending ones count as rejected.
pub fn restore_many<K: KeyValueStore>(
    store: &Store<K>,
    ids: &[String],
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<BulkOutcome, StoreError> {
    let trash = load_current(store, now)?;
    let mut outcome = BulkOutcome::default();
    let mut kept = Vec::with_capacity(trash.len());
    let mut restored = Vec::new();
    for doc in trash {
        if !ids.contains(&doc.id) {
            kept.push(doc);
            continue;
        }
        if may_decide(viewer, &doc) {
            outcome.applied.push(doc.id.clone());
            restored.push(restored_document(doc));
        } else {
            outcome.skipped.push(doc.id.clone());
            kept.push(doc);
        }
    }
    if restored.is_empty() {
        return Ok(outcome);
    }
    documents::insert_all(store, restored)?;
    store.save(store::TRASHED_DOCUMENTS, &kept)?;
    info!(count = outcome.applied.len(), by = %viewer.email, "trash entries restored");
    Ok(outcome)
}

/// Deletes the selected entries, or nothing at all if any is still pending.
pub fn delete_many<K: KeyValueStore>(
    store: &Store<K>,
    ids: &[String],
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<Result<BulkOutcome, TrashOutcome>, StoreError> {
    if !viewer.is_admin() {
        return Ok(Err(TrashOutcome::Forbidden));
    }
    let trash = load_current(store, now)?;
    let blocked = trash
        .iter()
        .any(|doc| ids.contains(&doc.id) && doc.pending_approval);
    if blocked {
        warn!("bulk delete blocked: selection includes entries pending approval");
        return Ok(Err(TrashOutcome::Blocked));
    }
    let mut outcome = BulkOutcome::default();
    let kept: Vec<Document> = trash
        .into_iter()
        .filter(|doc| {
            if ids.contains(&doc.id) {
                outcome.applied.push(doc.id.clone());
                false
            } else {
                true
            }
        })
        .collect();
    if !outcome.applied.is_empty() {
        store.save(store::TRASHED_DOCUMENTS, &kept)?;
        info!(count = outcome.applied.len(), by = %viewer.email, "trash entries deleted");
    }
    Ok(Ok(outcome))
}

/// Removes every approved entry. Entries still awaiting approval stay put.
pub fn empty<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<Result<usize, TrashOutcome>, StoreError> {
    if !viewer.is_admin() {
        return Ok(Err(TrashOutcome::Forbidden));
    }
    let trash = load_current(store, now)?;
    let before = trash.len();
    let kept: Vec<Document> = trash.into_iter().filter(|doc| doc.pending_approval).collect();
    let removed = before - kept.len();
    if kept.is_empty() {
        store.clear(store::TRASHED_DOCUMENTS)?;
    } else if removed > 0 {
        store.save(store::TRASHED_DOCUMENTS, &kept)?;
    }
    info!(removed, kept = kept.len(), by = %viewer.email, "trash emptied");
    Ok(Ok(removed))
}

fn move_back<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    viewer: &Session,
    expected: DocumentStatus,
    now: OffsetDateTime,
) -> Result<TrashOutcome, StoreError> {
    let mut trash = load_current(store, now)?;
    let Some(index) = trash.iter().position(|doc| doc.id == id) else {
        return Ok(TrashOutcome::NotFound);
    };
    if trash[index].status != expected {
        return Ok(TrashOutcome::InvalidState(trash[index].status));
    }
    if !may_decide(viewer, &trash[index]) {
        return Ok(TrashOutcome::Forbidden);
    }
    let doc = restored_document(trash.remove(index));
    documents::insert_all(store, vec![doc.clone()])?;
    store.save(store::TRASHED_DOCUMENTS, &trash)?;
    info!(doc_id = id, by = %viewer.email, "document restored");
    Ok(TrashOutcome::Applied(doc))
}

fn may_decide(viewer: &Session, doc: &Document) -> bool {
    viewer.is_admin() || viewer.answers_to(&doc.sender)
}

fn restored_document(mut doc: Document) -> Document {
    doc.status = DocumentStatus::Active;
    doc.pending_approval = false;
    doc.trashed_at = None;
    doc
}

/// Entries still awaiting sender approval never expire, so the purge cannot
/// hard-delete a document the sender has not signed off on.
fn expired(doc: &Document, now: OffsetDateTime) -> bool {
    if doc.pending_approval {
        return false;
    }
    match doc.trashed_at {
        Some(trashed_at) => now - trashed_at > RETENTION,
        None => false,
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryStore, MemoryStoreError};
    use crate::types::documents::{DocumentFilter, NewDocument};
    use crate::types::notifications::Notification;
    use time::Duration;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-03-10 12:00 UTC);

    fn admin() -> Session {
        Session {
            email: "admin@sllb.sl".to_string(),
            role: "Admin/HR".to_string(),
        }
    }

    fn sender() -> Session {
        Session {
            email: "branch@sllb.sl".to_string(),
            role: "Branch Librarian".to_string(),
        }
    }

    fn outsider() -> Session {
        Session {
            email: "user@sllb.sl".to_string(),
            role: "User".to_string(),
        }
    }

    /// Memory store whose writes to one key can be made to fail.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing_key: std::sync::Mutex<Option<&'static str>>,
    }

    impl FlakyStore {
        fn fail_writes_to(&self, key: Option<&'static str>) {
            *self.failing_key.lock().expect("lock") = key;
        }
    }

    impl KeyValueStore for FlakyStore {
        type Error = MemoryStoreError;

        fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> Result<(), Self::Error> {
            if *self.failing_key.lock().expect("lock") == Some(key) {
                return Err(MemoryStoreError);
            }
            self.inner.put(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), Self::Error> {
            self.inner.remove(key)
        }
    }

    fn upload<K: KeyValueStore>(store: &Store<K>) -> Document {
        documents::create(
            store,
            NewDocument {
                title: "Budget.pdf".to_string(),
                file_ref: "uploads/budget.pdf".to_string(),
                doc_type: "Report".to_string(),
                folder: "Finance".to_string(),
                recipient: Some("Admin/HR".to_string()),
                message: "Quarterly".to_string(),
            },
            "Branch Librarian",
            NOW - Duration::days(1),
        )
        .expect("create")
    }

    fn applied(outcome: TrashOutcome) -> Document {
        match outcome {
            TrashOutcome::Applied(doc) => doc,
            other => panic!("expected applied, got {other:?}"),
        }
    }

    #[test]
    fn request__should_mark_pending_and_notify_sender() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);

        // When
        let trashed = applied(request(&store, &doc.id, &admin(), NOW).expect("request"));

        // Then
        assert_eq!(trashed.status, DocumentStatus::PendingTrash);
        assert!(trashed.pending_approval);
        assert_eq!(trashed.trashed_at, Some(NOW));
        assert!(documents::get(&store, &doc.id).expect("get").is_none());

        let all: Vec<Notification> = store.load(store::NOTIFICATIONS).expect("load");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].action, NotificationAction::ApproveDelete);
        assert_eq!(all[0].recipient.as_deref(), Some("Branch Librarian"));
        assert_eq!(all[0].doc_id.as_deref(), Some(doc.id.as_str()));
    }

    #[test]
    fn request__should_keep_document_in_registry_when_trash_write_fails() {
        // Given
        let store = Store::new(FlakyStore::default());
        let doc = upload(&store);
        store.backend().fail_writes_to(Some(store::TRASHED_DOCUMENTS));

        // When
        let result = request(&store, &doc.id, &admin(), NOW);

        // Then
        assert!(result.is_err());
        let kept = documents::get(&store, &doc.id).expect("get").expect("still registered");
        assert_eq!(kept.status, DocumentStatus::Active);
        let trash: Vec<Document> = store.load(store::TRASHED_DOCUMENTS).expect("load");
        assert!(trash.is_empty());
    }

    #[test]
    fn request__should_replace_leftover_trash_entry_on_retry() {
        // Given
        let store = Store::new(FlakyStore::default());
        let doc = upload(&store);
        store.backend().fail_writes_to(Some(store::UPLOADED_DOCUMENTS));
        assert!(request(&store, &doc.id, &admin(), NOW).is_err());
        store.backend().fail_writes_to(None);

        // When
        let retried = applied(request(&store, &doc.id, &admin(), NOW).expect("retry"));

        // Then
        assert_eq!(retried.status, DocumentStatus::PendingTrash);
        assert!(documents::get(&store, &doc.id).expect("get").is_none());
        let trash: Vec<Document> = store.load(store::TRASHED_DOCUMENTS).expect("load");
        assert_eq!(trash.len(), 1);
    }

    #[test]
    fn reject__should_keep_trash_entry_when_registry_write_fails() {
        // Given
        let store = Store::new(FlakyStore::default());
        let doc = upload(&store);
        applied(request(&store, &doc.id, &admin(), NOW).expect("request"));
        store.backend().fail_writes_to(Some(store::UPLOADED_DOCUMENTS));

        // When
        let result = reject(&store, &doc.id, &sender(), NOW);

        // Then
        assert!(result.is_err());
        let trash: Vec<Document> = store.load(store::TRASHED_DOCUMENTS).expect("load");
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].status, DocumentStatus::PendingTrash);
    }

    #[test]
    fn request__should_refuse_unrelated_viewer() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);

        // When
        let outcome = request(&store, &doc.id, &outsider(), NOW).expect("request");

        // Then
        assert_eq!(outcome, TrashOutcome::Forbidden);
        assert!(documents::get(&store, &doc.id).expect("get").is_some());
    }

    #[test]
    fn request_then_restore__should_round_trip_document() {
        // Given
        let store = Store::new(MemoryStore::default());
        let original = upload(&store);
        request(&store, &original.id, &admin(), NOW).expect("request");
        approve(&store, &original.id, &sender(), NOW).expect("approve");

        // When
        let restored = applied(restore(&store, &original.id, &sender(), NOW).expect("restore"));

        // Then
        assert_eq!(restored, original);
        let stored = documents::get(&store, &original.id).expect("get").expect("document");
        assert_eq!(stored, original);
        assert!(load_current(&store, NOW).expect("trash").is_empty());
    }

    #[test]
    fn reject__should_return_document_to_folder_as_active() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);
        request(&store, &doc.id, &admin(), NOW).expect("request");

        // When
        let rejected = applied(reject(&store, &doc.id, &sender(), NOW).expect("reject"));

        // Then
        assert_eq!(rejected.status, DocumentStatus::Active);
        let finance = documents::list(&store, &DocumentFilter::in_folder("Finance")).expect("list");
        assert_eq!(finance.len(), 1);
        assert_eq!(finance[0].id, doc.id);
        assert_eq!(finance[0].status, DocumentStatus::Active);
    }

    #[test]
    fn approve__should_only_apply_from_pending_trash() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);
        request(&store, &doc.id, &admin(), NOW).expect("request");
        approve(&store, &doc.id, &sender(), NOW).expect("approve");

        // When
        let again = approve(&store, &doc.id, &sender(), NOW).expect("approve again");
        let active = upload(&store);
        let on_active = approve(&store, &active.id, &sender(), NOW).expect("approve active");

        // Then
        assert_eq!(again, TrashOutcome::InvalidState(DocumentStatus::Trashed));
        assert_eq!(on_active, TrashOutcome::NotFound);
    }

    #[test]
    fn approve__should_require_sender_or_admin() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);
        request(&store, &doc.id, &admin(), NOW).expect("request");

        // When
        let outcome = approve(&store, &doc.id, &outsider(), NOW).expect("approve");

        // Then
        assert_eq!(outcome, TrashOutcome::Forbidden);
    }

    #[test]
    fn permanently_delete__should_be_blocked_while_pending_approval() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);
        request(&store, &doc.id, &admin(), NOW).expect("request");

        // When
        let outcome = permanently_delete(&store, &doc.id, &admin(), NOW).expect("delete");

        // Then
        assert_eq!(outcome, TrashOutcome::Blocked);
        let trash = load_current(&store, NOW).expect("trash");
        assert_eq!(trash.len(), 1);
        assert!(trash[0].pending_approval);
    }

    #[test]
    fn permanently_delete__should_remove_after_approval() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);
        request(&store, &doc.id, &admin(), NOW).expect("request");
        approve(&store, &doc.id, &sender(), NOW).expect("approve");

        // When
        let outcome = permanently_delete(&store, &doc.id, &admin(), NOW).expect("delete");

        // Then
        assert!(matches!(outcome, TrashOutcome::Applied(_)));
        assert!(load_current(&store, NOW).expect("trash").is_empty());
        assert!(documents::get(&store, &doc.id).expect("get").is_none());
    }

    #[test]
    fn load_current__should_purge_only_entries_past_retention() {
        // Given
        let store = Store::new(MemoryStore::default());
        let boundary = upload(&store);
        let expired_doc = upload(&store);
        let pending = upload(&store);
        let requested_at = NOW - RETENTION;
        request(&store, &boundary.id, &admin(), requested_at).expect("request");
        approve(&store, &boundary.id, &sender(), requested_at).expect("approve");
        let older = NOW - RETENTION - Duration::seconds(1);
        request(&store, &expired_doc.id, &admin(), older).expect("request");
        approve(&store, &expired_doc.id, &sender(), older).expect("approve");
        request(&store, &pending.id, &admin(), older).expect("request");

        // When
        let trash = load_current(&store, NOW).expect("trash");

        // Then
        let ids: Vec<&str> = trash.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&boundary.id.as_str()));
        assert!(ids.contains(&pending.id.as_str()));
    }

    #[test]
    fn delete_many__should_refuse_whole_batch_when_any_pending() {
        // Given
        let store = Store::new(MemoryStore::default());
        let approved = upload(&store);
        let pending = upload(&store);
        request(&store, &approved.id, &admin(), NOW).expect("request");
        approve(&store, &approved.id, &sender(), NOW).expect("approve");
        request(&store, &pending.id, &admin(), NOW).expect("request");
        let ids = vec![approved.id.clone(), pending.id.clone()];

        // When
        let outcome = delete_many(&store, &ids, &admin(), NOW).expect("delete many");

        // Then
        assert_eq!(outcome, Err(TrashOutcome::Blocked));
        assert_eq!(load_current(&store, NOW).expect("trash").len(), 2);
    }

    #[test]
    fn restore_many__should_skip_entries_viewer_cannot_decide() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);
        request(&store, &doc.id, &admin(), NOW).expect("request");
        let ids = vec![doc.id.clone()];

        // When
        let denied = restore_many(&store, &ids, &outsider(), NOW).expect("restore outsider");
        let allowed = restore_many(&store, &ids, &sender(), NOW).expect("restore sender");

        // Then
        assert_eq!(denied.skipped, ids);
        assert_eq!(allowed.applied, ids);
        let stored = documents::get(&store, &doc.id).expect("get").expect("document");
        assert_eq!(stored.status, DocumentStatus::Active);
    }

    #[test]
    fn empty__should_keep_entries_pending_approval() {
        // Given
        let store = Store::new(MemoryStore::default());
        let approved = upload(&store);
        let pending = upload(&store);
        request(&store, &approved.id, &admin(), NOW).expect("request");
        approve(&store, &approved.id, &sender(), NOW).expect("approve");
        request(&store, &pending.id, &admin(), NOW).expect("request");

        // When
        let removed = empty(&store, &admin(), NOW).expect("empty");

        // Then
        assert_eq!(removed, Ok(1));
        let trash = load_current(&store, NOW).expect("trash");
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].id, pending.id);
    }

    #[test]
    fn list_for__should_hide_unrelated_entries_from_non_admins() {
        // Given
        let store = Store::new(MemoryStore::default());
        let doc = upload(&store);
        request(&store, &doc.id, &admin(), NOW).expect("request");

        // When
        let for_outsider = list_for(&store, &outsider(), NOW).expect("outsider");
        let for_sender = list_for(&store, &sender(), NOW).expect("sender");

        // Then
        assert!(for_outsider.is_empty());
        assert_eq!(for_sender.len(), 1);
    }
}
