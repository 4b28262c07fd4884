use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub user: String,
    pub action: String,
    pub target: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}
