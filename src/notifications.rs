use crate::config::RETENTION;
use crate::ports::KeyValueStore;
use crate::store::{self, Store, StoreError};
use crate::types::new_id;
use crate::types::notifications::{Notification, NotificationAction, NotificationFilter};
use crate::types::users::Session;

use time::OffsetDateTime;
use tracing::debug;

pub struct NotificationDraft<'a> {
    pub recipient: Option<&'a str>,
    pub title: String,
    pub sender: &'a str,
    pub action: NotificationAction,
    pub doc_id: Option<&'a str>,
}

pub fn push<K: KeyValueStore>(
    store: &Store<K>,
    draft: NotificationDraft<'_>,
    now: OffsetDateTime,
) -> Result<Notification, StoreError> {
    let notification = Notification {
        id: new_id(),
        recipient: draft.recipient.map(str::to_string),
        title: draft.title,
        sender: draft.sender.to_string(),
        timestamp: now,
        unread: true,
        action: draft.action,
        doc_id: draft.doc_id.map(str::to_string),
    };
    let mut all: Vec<Notification> = store.load(store::NOTIFICATIONS)?;
    all.push(notification.clone());
    store.save(store::NOTIFICATIONS, &all)?;
    Ok(notification)
}

pub fn is_visible(notification: &Notification, viewer: &Session) -> bool {
    match notification.recipient.as_deref() {
        None => true,
        Some(recipient) => viewer.answers_to(recipient),
    }
}

/// Loads the queue, dropping and persisting away anything past retention.
pub(crate) fn load_current<K: KeyValueStore>(
    store: &Store<K>,
    now: OffsetDateTime,
) -> Result<Vec<Notification>, StoreError> {
    let all: Vec<Notification> = store.load(store::NOTIFICATIONS)?;
    let before = all.len();
    let kept: Vec<Notification> = all
        .into_iter()
        .filter(|notification| now - notification.timestamp <= RETENTION)
        .collect();
    if kept.len() != before {
        debug!(purged = before - kept.len(), "expired notifications purged");
        store.save(store::NOTIFICATIONS, &kept)?;
    }
    Ok(kept)
}

pub fn list_for<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
    filter: NotificationFilter,
    search: Option<&str>,
    now: OffsetDateTime,
) -> Result<Vec<Notification>, StoreError> {
    let needle = search
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());
    let mut visible: Vec<Notification> = load_current(store, now)?
        .into_iter()
        .filter(|notification| is_visible(notification, viewer))
        .filter(|notification| match filter {
            NotificationFilter::All => true,
            NotificationFilter::Unread => notification.unread,
            NotificationFilter::Today => notification.timestamp.date() == now.date(),
        })
        .filter(|notification| match needle.as_deref() {
            Some(needle) => notification.title.to_lowercase().contains(needle),
            None => true,
        })
        .collect();
    visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(visible)
}

pub fn unread_count<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<usize, StoreError> {
    Ok(load_current(store, now)?
        .iter()
        .filter(|notification| notification.unread && is_visible(notification, viewer))
        .count())
}

/// Returns `false` when the id is unknown or not addressed to `viewer`.
pub fn mark_read<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    viewer: &Session,
) -> Result<bool, StoreError> {
    let mut all: Vec<Notification> = store.load(store::NOTIFICATIONS)?;
    let Some(notification) = all
        .iter_mut()
        .find(|notification| notification.id == id && is_visible(notification, viewer))
    else {
        return Ok(false);
    };
    if notification.unread {
        notification.unread = false;
        store.save(store::NOTIFICATIONS, &all)?;
    }
    Ok(true)
}

pub fn mark_all_read<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<usize, StoreError> {
    let mut all = load_current(store, now)?;
    let mut changed = 0usize;
    for notification in all.iter_mut() {
        if notification.unread && is_visible(notification, viewer) {
            notification.unread = false;
            changed += 1;
        }
    }
    if changed > 0 {
        store.save(store::NOTIFICATIONS, &all)?;
    }
    Ok(changed)
}

pub fn delete<K: KeyValueStore>(
    store: &Store<K>,
    id: &str,
    viewer: &Session,
) -> Result<bool, StoreError> {
    let mut all: Vec<Notification> = store.load(store::NOTIFICATIONS)?;
    let before = all.len();
    all.retain(|notification| !(notification.id == id && is_visible(notification, viewer)));
    if all.len() == before {
        return Ok(false);
    }
    store.save(store::NOTIFICATIONS, &all)?;
    Ok(true)
}

pub fn delete_all_visible<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<usize, StoreError> {
    let mut all = load_current(store, now)?;
    let before = all.len();
    all.retain(|notification| !is_visible(notification, viewer));
    let removed = before - all.len();
    if removed > 0 {
        store.save(store::NOTIFICATIONS, &all)?;
    }
    Ok(removed)
}
