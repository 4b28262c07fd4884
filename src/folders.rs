use crate::documents;
use crate::ports::KeyValueStore;
use crate::store::{self, Store, StoreError};
use crate::types::folders::{Folder, NewFolder};
use crate::types::users::Session;

use serde::Serialize;
use tracing::info;

/// Seeded when the folder blob is empty.
pub fn default_folders() -> Vec<Folder> {
    vec![
        Folder {
            id: 1,
            name: "HQ Management".to_string(),
            description: "Headquarters documents".to_string(),
            owner_id: "admin".to_string(),
            allowed_users: vec!["Admin".to_string(), "Admin/HR".to_string()],
        },
        Folder {
            id: 2,
            name: "Regional Kenema".to_string(),
            description: "Kenema regional office".to_string(),
            owner_id: "chief".to_string(),
            allowed_users: vec!["Chief Librarian".to_string()],
        },
        Folder {
            id: 3,
            name: "Adult Lending HQ".to_string(),
            description: "Adult lending section".to_string(),
            owner_id: "user123".to_string(),
            allowed_users: vec!["user123".to_string()],
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderListing {
    #[serde(flatten)]
    pub folder: Folder,
    pub document_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum FolderError {
    #[error("folder name is required")]
    MissingName,
    #[error("a folder named '{0}' already exists")]
    Duplicate(String),
    #[error("only admins may create folders")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn load<K: KeyValueStore>(store: &Store<K>) -> Result<Vec<Folder>, StoreError> {
    let folders: Vec<Folder> = store.load(store::FOLDERS)?;
    if !folders.is_empty() {
        return Ok(folders);
    }
    let defaults = default_folders();
    store.save(store::FOLDERS, &defaults)?;
    info!(count = defaults.len(), "default folders seeded");
    Ok(defaults)
}

pub fn can_open(viewer: &Session, folder: &Folder) -> bool {
    viewer.is_admin()
        || folder.owner_id.eq_ignore_ascii_case(&viewer.email)
        || folder
            .allowed_users
            .iter()
            .any(|allowed| viewer.answers_to(allowed))
}

/// Folders the viewer may open, with document counts, optionally narrowed by name.
pub fn visible_for<K: KeyValueStore>(
    store: &Store<K>,
    viewer: &Session,
    search: Option<&str>,
) -> Result<Vec<FolderListing>, StoreError> {
    let needle = search
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());
    let counts = documents::folder_counts(store)?;
    Ok(load(store)?
        .into_iter()
        .filter(|folder| match needle.as_deref() {
            Some(needle) => folder.name.to_lowercase().contains(needle),
            None => true,
        })
        .filter(|folder| can_open(viewer, folder))
        .map(|folder| FolderListing {
            document_count: counts.get(&folder.name).copied().unwrap_or(0),
            folder,
        })
        .collect())
}

pub fn create<K: KeyValueStore>(
    store: &Store<K>,
    new: NewFolder,
    viewer: &Session,
) -> Result<Folder, FolderError> {
    if !viewer.is_admin() {
        return Err(FolderError::Forbidden);
    }
    let name = new.name.trim();
    if name.is_empty() {
        return Err(FolderError::MissingName);
    }
    let mut folders = load(store)?;
    if folders
        .iter()
        .any(|folder| folder.name.eq_ignore_ascii_case(name))
    {
        return Err(FolderError::Duplicate(name.to_string()));
    }
    let id = folders.iter().map(|folder| folder.id).max().unwrap_or(0) + 1;
    let folder = Folder {
        id,
        name: name.to_string(),
        description: new.description.trim().to_string(),
        owner_id: viewer.email.clone(),
        allowed_users: new
            .allowed_users
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect(),
    };
    folders.push(folder.clone());
    store.save(store::FOLDERS, &folders)?;
    info!(folder = %folder.name, by = %viewer.email, "folder created");
    Ok(folder)
}

/// Applied only when no folders have been stored yet.
pub(crate) fn seed<K: KeyValueStore>(
    store: &Store<K>,
    folders: Vec<Folder>,
) -> Result<bool, StoreError> {
    let existing: Vec<Folder> = store.load(store::FOLDERS)?;
    if !existing.is_empty() || folders.is_empty() {
        return Ok(false);
    }
    store.save(store::FOLDERS, &folders)?;
    Ok(true)
}
