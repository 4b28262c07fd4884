use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Roles routed to the admin dashboard and allowed to manage the portal.
pub const ADMIN_ROLES: &[&str] = &[
    "Admin",
    "Admin/HR",
    "Chief Librarian",
    "Deputy Chief Librarian",
    "Principal Librarian",
];

/// The only role that may be created without a branch.
pub const BRANCHLESS_ROLE: &str = "Admin/HR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn label(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            UserStatus::Active => UserStatus::Inactive,
            UserStatus::Inactive => UserStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A [`User`] without credentials, safe to hand to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub branch: Option<String>,
    pub status: UserStatus,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role.clone(),
            branch: user.branch.clone(),
            status: user.status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(alias = "username")]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub password: String,
    #[serde(default)]
    pub status: UserStatus,
}

/// The signed-in identity. Documents and notifications address either field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    pub role: String,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES
            .iter()
            .any(|role| role.eq_ignore_ascii_case(&self.role))
    }

    pub fn answers_to(&self, address: &str) -> bool {
        let address = address.trim();
        !address.is_empty()
            && (address.eq_ignore_ascii_case(&self.role) || address.eq_ignore_ascii_case(&self.email))
    }
}
