use crate::ports::KeyValueStore;
use crate::store::{self, Store, StoreError};
use crate::types::documents::{Document, DocumentFilter, DocumentStatus, NewDocument};
use crate::types::new_id;
use crate::types::users::Session;

use std::collections::BTreeMap;
use time::OffsetDateTime;

pub fn create<K: KeyValueStore>(
    store: &Store<K>,
    new: NewDocument,
    sender: &str,
    now: OffsetDateTime,
) -> Result<Document, StoreError> {
    let recipient = new
        .recipient
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let document = Document {
        id: new_id(),
        title: new.title,
        file_ref: new.file_ref,
        doc_type: new.doc_type,
        folder: new.folder,
        sender: sender.to_string(),
        recipient,
        message: new.message,
        created_at: now,
        status: DocumentStatus::Active,
        pending_approval: false,
        trashed_at: None,
    };
    let mut all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    all.push(document.clone());
    store.save(store::UPLOADED_DOCUMENTS, &all)?;
    Ok(document)
}

pub fn list<K: KeyValueStore>(
    store: &Store<K>,
    filter: &DocumentFilter,
) -> Result<Vec<Document>, StoreError> {
    let all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    Ok(all.into_iter().filter(|doc| filter.matches(doc)).collect())
}

pub fn get<K: KeyValueStore>(store: &Store<K>, id: &str) -> Result<Option<Document>, StoreError> {
    let all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    Ok(all.into_iter().find(|doc| doc.id == id))
}

/// Documents addressed to the viewer's role or email.
pub fn inbox<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
) -> Result<Vec<Document>, StoreError> {
    let all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    Ok(all
        .into_iter()
        .filter(|doc| {
            doc.recipient
                .as_deref()
                .is_some_and(|recipient| viewer.answers_to(recipient))
        })
        .collect())
}

pub fn outbox<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
) -> Result<Vec<Document>, StoreError> {
    let all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    Ok(all
        .into_iter()
        .filter(|doc| viewer.answers_to(&doc.sender))
        .collect())
}

pub fn set_status<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    status: DocumentStatus,
) -> Result<bool, StoreError> {
    update(store, id, |doc| doc.status = status)
}

pub fn set_approval<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    pending: bool,
) -> Result<bool, StoreError> {
    update(store, id, |doc| doc.pending_approval = pending)
}

pub fn folder_counts<K: KeyValueStore>(
    store: &Store<K>,
) -> Result<BTreeMap<String, usize>, StoreError> {
    let all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    let mut counts = BTreeMap::new();
    for doc in all {
        *counts.entry(doc.folder).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Removes the document from the registry and hands it back.
pub(crate) fn take<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
) -> Result<Option<Document>, StoreError> {
    let mut all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    let Some(index) = all.iter().position(|doc| doc.id == id) else {
        return Ok(None);
    };
    let doc = all.remove(index);
    store.save(store::UPLOADED_DOCUMENTS, &all)?;
    Ok(Some(doc))
}

/// Adds `docs` to the registry, replacing any entry that already has the same id.
pub(crate) fn insert_all<K: KeyValueStore>(
    store: &Store<K>,
    docs: Vec<Document>,
) -> Result<(), StoreError> {
    if docs.is_empty() {
        return Ok(());
    }
    let mut all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    all.retain(|existing| !docs.iter().any(|doc| doc.id == existing.id));
    all.extend(docs);
    store.save(store::UPLOADED_DOCUMENTS, &all)
}

fn update<K, F>(store: &Store<K>, id: &str, apply: F) -> Result<bool, StoreError>
where
    K: KeyValueStore,
    F: FnOnce(&mut Document),
{
    let mut all: Vec<Document> = store.load(store::UPLOADED_DOCUMENTS)?;
    let Some(doc) = all.iter_mut().find(|doc| doc.id == id) else {
        return Ok(false);
    };
    apply(doc);
    store.save(store::UPLOADED_DOCUMENTS, &all)?;
    Ok(true)
}
