use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStatus {
    Active,
    PendingTrash,
    Trashed,
}

impl DocumentStatus {
    pub fn label(self) -> &'static str {
        match self {
            DocumentStatus::Active => "active",
            DocumentStatus::PendingTrash => "pending-trash",
            DocumentStatus::Trashed => "trashed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub file_ref: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub folder: String,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: DocumentStatus,
    #[serde(default)]
    pub pending_approval: bool,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub trashed_at: Option<OffsetDateTime>,
}

/// Fields supplied by the uploader; the registry fills in the rest.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub title: String,
    pub file_ref: String,
    pub doc_type: String,
    pub folder: String,
    pub recipient: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub folder: Option<String>,
    pub recipient: Option<String>,
    pub sender: Option<String>,
    pub status: Option<DocumentStatus>,
    pub search: Option<String>,
}

impl DocumentFilter {
    pub fn in_folder(folder: &str) -> Self {
        Self {
            folder: Some(folder.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(folder) = self.folder.as_deref()
            && doc.folder != folder
        {
            return false;
        }
        if let Some(recipient) = self.recipient.as_deref() {
            let addressed = doc
                .recipient
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case(recipient));
            if !addressed {
                return false;
            }
        }
        if let Some(sender) = self.sender.as_deref()
            && !doc.sender.eq_ignore_ascii_case(sender)
        {
            return false;
        }
        if let Some(status) = self.status
            && doc.status != status
        {
            return false;
        }
        if let Some(search) = self.search.as_deref() {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty() {
                let hit = doc.title.to_lowercase().contains(&needle)
                    || doc.sender.to_lowercase().contains(&needle)
                    || doc
                        .recipient
                        .as_deref()
                        .is_some_and(|value| value.to_lowercase().contains(&needle));
                if !hit {
                    return false;
                }
            }
        }
        true
    }
}
