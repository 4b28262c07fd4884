//! Initial users and folders loaded from a TOML file on first start.
//!
//! ```toml
//! [[users]]
//! name = "Head Office"
//! email = "admin@sllb.sl"
//! role = "Admin/HR"
//! password_hash = "$argon2id$v=19$..."
//!
//! [[folders]]
//! id = 1
//! name = "HQ Management"
//! description = "Headquarters documents"
//! owner_id = "admin@sllb.sl"
//! allowed_users = ["Admin/HR"]
//! ```

use crate::types::folders::Folder;
use crate::types::new_id;
use crate::types::users::{User, UserStatus};

use serde::Deserialize;
use std::path::Path;
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid seed file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub folders: Vec<SeedFolder>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub password_hash: String,
    #[serde(default)]
    pub status: UserStatus,
}

#[derive(Debug, Deserialize)]
pub struct SeedFolder {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

impl SeedFile {
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| SeedError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub(crate) fn users(&self, now: OffsetDateTime) -> Vec<User> {
        self.users
            .iter()
            .map(|user| User {
                id: new_id(),
                name: user.name.clone(),
                email: user.email.trim().to_lowercase(),
                phone: user.phone.clone(),
                role: user.role.clone(),
                branch: user.branch.clone(),
                status: user.status,
                password_hash: user.password_hash.clone(),
                created_at: now,
            })
            .collect()
    }

    pub(crate) fn folders(&self) -> Vec<Folder> {
        self.folders
            .iter()
            .map(|folder| Folder {
                id: folder.id,
                name: folder.name.clone(),
                description: folder.description.clone(),
                owner_id: folder.owner_id.clone(),
                allowed_users: folder.allowed_users.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parse__should_read_users_and_folders() {
        // Given
        let raw = r#"
[[users]]
name = "Head Office"
email = "Admin@SLLB.sl"
role = "Admin/HR"
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"

[[folders]]
id = 7
name = "Finance"
owner_id = "admin@sllb.sl"
allowed_users = ["Admin/HR"]
"#;

        // When
        let seed = SeedFile::parse(raw).expect("parse");
        let users = seed.users(datetime!(2025-03-10 12:00 UTC));
        let folders = seed.folders();

        // Then
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "admin@sllb.sl");
        assert_eq!(users[0].status, UserStatus::Active);
        assert_eq!(folders[0].id, 7);
        assert_eq!(folders[0].description, "");
    }

    #[test]
    fn parse__should_accept_empty_file() {
        // When
        let seed = SeedFile::parse("").expect("parse");

        // Then
        assert!(seed.users.is_empty());
        assert!(seed.folders.is_empty());
    }
}
