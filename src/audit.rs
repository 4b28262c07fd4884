use crate::ports::KeyValueStore;
use crate::store::{self, Store, StoreError};
use crate::types::audit::AuditEntry;
use crate::types::new_id;

use serde::Serialize;
use std::borrow::Cow;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    All,
    Items(usize),
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Items(DEFAULT_PAGE_SIZE)
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(PageSize::All);
        }
        match value.parse::<usize>() {
            Ok(0) | Err(_) => Err(format!("invalid page size '{value}'")),
            Ok(size) => Ok(PageSize::Items(size)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: Option<usize>,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Slices `items` into 1-based pages; out-of-range pages clamp to the last one.
pub fn paginate<T>(items: Vec<T>, page: usize, size: PageSize) -> Page<T> {
    let total_items = items.len();
    match size {
        PageSize::All => Page {
            items,
            page: 1,
            page_size: None,
            total_pages: 1,
            total_items,
        },
        PageSize::Items(size) => {
            let total_pages = total_items.div_ceil(size).max(1);
            let page = page.clamp(1, total_pages);
            let items = items
                .into_iter()
                .skip((page - 1) * size)
                .take(size)
                .collect();
            Page {
                items,
                page,
                page_size: Some(size),
                total_pages,
                total_items,
            }
        }
    }
}

pub fn record<K: KeyValueStore>(
    store: &Store<K>,
    user: &str,
    action: &str,
    target: &str,
    now: OffsetDateTime,
) -> Result<AuditEntry, StoreError> {
    let entry = AuditEntry {
        id: new_id(),
        user: user.to_string(),
        action: action.to_string(),
        target: target.to_string(),
        date: now,
    };
    let mut all: Vec<AuditEntry> = store.load(store::AUDIT_LOGS)?;
    all.push(entry.clone());
    store.save(store::AUDIT_LOGS, &all)?;
    Ok(entry)
}

/// Newest first, narrowed by a case-insensitive search on user, action or target.
pub fn search<K: KeyValueStore>(
    store: &Store<K>,
    search: Option<&str>,
) -> Result<Vec<AuditEntry>, StoreError> {
    let needle = search
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());
    let mut entries: Vec<AuditEntry> = store.load(store::AUDIT_LOGS)?;
    entries.retain(|entry| match needle.as_deref() {
        Some(needle) => [&entry.user, &entry.action, &entry.target]
            .iter()
            .any(|value| value.to_lowercase().contains(needle)),
        None => true,
    });
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(entries)
}

pub fn list<K: KeyValueStore>(
    store: &Store<K>,
    query: Option<&str>,
    page: usize,
    size: PageSize,
) -> Result<Page<AuditEntry>, StoreError> {
    Ok(paginate(search(store, query)?, page, size))
}

/// Renders entries as `User,Action,Target,Date` CSV.
pub fn to_csv(entries: &[AuditEntry]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["User", "Action", "Target", "Date"])?;
    for entry in entries {
        let date = entry.date.format(&Rfc3339).unwrap_or_default();
        writer.write_record([
            &*neutralize_formula(&entry.user),
            &*neutralize_formula(&entry.action),
            &*neutralize_formula(&entry.target),
            date.as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|err| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, err)))
}

/// Prefixes `'` to values a spreadsheet would run as a formula.
fn neutralize_formula(value: &str) -> Cow<'_, str> {
    if value.trim_start().starts_with(['=', '+', '-', '@']) {
        Cow::Owned(format!("'{value}"))
    } else {
        Cow::Borrowed(value)
    }
}
