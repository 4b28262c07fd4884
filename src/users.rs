use crate::ports::KeyValueStore;
use crate::store::{self, Store, StoreError};
use crate::types::new_id;
use crate::types::users::{BRANCHLESS_ROLE, NewUser, Session, User, UserStatus, UserSummary};

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use time::OffsetDateTime;
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("name is required")]
    MissingName,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("role is required")]
    MissingRole,
    #[error("branch is required for this role")]
    MissingBranch,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("a user with email '{0}' already exists")]
    Duplicate(String),
    #[error("only admins may manage users")]
    Forbidden,
    #[error("failed to hash password")]
    Hash,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| UserError::Hash)
}

pub(crate) fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn list<K: KeyValueStore>(
    store: &Store<K>,
    search: Option<&str>,
) -> Result<Vec<UserSummary>, StoreError> {
    let needle = search
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());
    let users: Vec<User> = store.load(store::USERS)?;
    Ok(users
        .iter()
        .filter(|user| match needle.as_deref() {
            Some(needle) => [&user.name, &user.email, &user.role]
                .iter()
                .any(|value| value.to_lowercase().contains(needle)),
            None => true,
        })
        .map(UserSummary::from)
        .collect())
}

pub fn admin_create<K: KeyValueStore>(
    store: &Store<K>,
    new: NewUser,
    viewer: &Session,
    now: OffsetDateTime,
) -> Result<UserSummary, UserError> {
    if !viewer.is_admin() {
        return Err(UserError::Forbidden);
    }
    let name = new.name.trim();
    if name.is_empty() {
        return Err(UserError::MissingName);
    }
    let email = new.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(UserError::InvalidEmail);
    }
    let role = new.role.trim();
    if role.is_empty() {
        return Err(UserError::MissingRole);
    }
    let branch = new
        .branch
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    if role != BRANCHLESS_ROLE && branch.is_none() {
        return Err(UserError::MissingBranch);
    }
    if new.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::WeakPassword);
    }

    let mut users: Vec<User> = store.load(store::USERS)?;
    if users.iter().any(|user| user.email.eq_ignore_ascii_case(&email)) {
        return Err(UserError::Duplicate(email));
    }
    let user = User {
        id: new_id(),
        name: name.to_string(),
        email,
        phone: new
            .phone
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        role: role.to_string(),
        branch,
        status: new.status,
        password_hash: hash_password(&new.password)?,
        created_at: now,
    };
    let summary = UserSummary::from(&user);
    users.push(user);
    store.save(store::USERS, &users)?;
    info!(email = %summary.email, role = %summary.role, by = %viewer.email, "user created");
    Ok(summary)
}

/// Flips active/inactive; `None` when no user has that email.
pub fn toggle_status<K: KeyValueStore>(
    store: &Store<K>,
    email: &str,
    viewer: &Session,
) -> Result<Option<UserSummary>, UserError> {
    if !viewer.is_admin() {
        return Err(UserError::Forbidden);
    }
    let mut users: Vec<User> = store.load(store::USERS)?;
    let Some(user) = users
        .iter_mut()
        .find(|user| user.email.eq_ignore_ascii_case(email))
    else {
        return Ok(None);
    };
    user.status = user.status.toggled();
    let summary = UserSummary::from(&*user);
    store.save(store::USERS, &users)?;
    Ok(Some(summary))
}

pub fn delete<K: KeyValueStore>(
    store: &Store<K>,
    email: &str,
    viewer: &Session,
) -> Result<bool, UserError> {
    if !viewer.is_admin() {
        return Err(UserError::Forbidden);
    }
    let mut users: Vec<User> = store.load(store::USERS)?;
    let before = users.len();
    users.retain(|user| !user.email.eq_ignore_ascii_case(email));
    if users.len() == before {
        return Ok(false);
    }
    store.save(store::USERS, &users)?;
    info!(email, by = %viewer.email, "user deleted");
    Ok(true)
}

/// Checks credentials; inactive users and unknown emails both yield `None`.
pub fn authenticate<K: KeyValueStore>(
    store: &Store<K>,
    email: &str,
    password: &str,
) -> Result<Option<Session>, StoreError> {
    let users: Vec<User> = store.load(store::USERS)?;
    let email = email.trim();
    let Some(user) = users
        .iter()
        .find(|user| user.email.eq_ignore_ascii_case(email))
    else {
        return Ok(None);
    };
    if user.status != UserStatus::Active {
        warn!(email, "login refused for inactive user");
        return Ok(None);
    }
    if !verify_password(password, &user.password_hash) {
        return Ok(None);
    }
    Ok(Some(Session {
        email: user.email.clone(),
        role: user.role.clone(),
    }))
}

/// Current session for a signed-in email, taken from the stored record.
/// Deleted and inactive users get `None`.
pub fn session_for<K: KeyValueStore>(
    store: &Store<K>,
    email: &str,
) -> Result<Option<Session>, StoreError> {
    let users: Vec<User> = store.load(store::USERS)?;
    let email = email.trim();
    Ok(users
        .iter()
        .find(|user| user.email.eq_ignore_ascii_case(email))
        .filter(|user| user.status == UserStatus::Active)
        .map(|user| Session {
            email: user.email.clone(),
            role: user.role.clone(),
        }))
}

/// Applied only when no users have been stored yet.
pub(crate) fn seed<K: KeyValueStore>(
    store: &Store<K>,
    users: Vec<User>,
) -> Result<bool, StoreError> {
    let existing: Vec<User> = store.load(store::USERS)?;
    if !existing.is_empty() || users.is_empty() {
        return Ok(false);
    }
    store.save(store::USERS, &users)?;
    Ok(true)
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use time::macros::datetime;

    fn admin() -> Session {
        Session {
            email: "admin@sllb.sl".to_string(),
            role: "Admin/HR".to_string(),
        }
    }

    fn new_user(email: &str, role: &str, branch: Option<&str>) -> NewUser {
        NewUser {
            name: "Fatmata Kamara".to_string(),
            email: email.to_string(),
            phone: None,
            role: role.to_string(),
            branch: branch.map(str::to_string),
            password: "correct-horse".to_string(),
            status: UserStatus::Active,
        }
    }

    #[test]
    fn admin_create__should_hash_password_and_authenticate() {
        // Given
        let store = Store::new(MemoryStore::default());
        let now = datetime!(2025-03-10 12:00 UTC);

        // When
        let created = admin_create(
            &store,
            new_user("Fatmata@SLLB.sl", "Branch Librarian", Some("Bo")),
            &admin(),
            now,
        )
        .expect("create");
        let session = authenticate(&store, "fatmata@sllb.sl", "correct-horse").expect("auth");
        let wrong = authenticate(&store, "fatmata@sllb.sl", "wrong-password").expect("auth");

        // Then
        assert_eq!(created.email, "fatmata@sllb.sl");
        let session = session.expect("session");
        assert_eq!(session.role, "Branch Librarian");
        assert!(wrong.is_none());
        let stored: Vec<User> = store.load(store::USERS).expect("load");
        assert_ne!(stored[0].password_hash, "correct-horse");
    }

    #[test]
    fn admin_create__should_require_branch_except_for_admin_hr() {
        // Given
        let store = Store::new(MemoryStore::default());
        let now = datetime!(2025-03-10 12:00 UTC);

        // When
        let missing = admin_create(
            &store,
            new_user("a@sllb.sl", "Branch Librarian", None),
            &admin(),
            now,
        );
        let hr = admin_create(&store, new_user("b@sllb.sl", "Admin/HR", None), &admin(), now);

        // Then
        assert!(matches!(missing, Err(UserError::MissingBranch)));
        assert!(hr.is_ok());
    }

    #[test]
    fn admin_create__should_reject_duplicates_and_bad_input() {
        // Given
        let store = Store::new(MemoryStore::default());
        let now = datetime!(2025-03-10 12:00 UTC);
        admin_create(&store, new_user("a@sllb.sl", "Admin/HR", None), &admin(), now)
            .expect("create");
        let mut weak = new_user("c@sllb.sl", "Admin/HR", None);
        weak.password = "short".to_string();

        // Then
        assert!(matches!(
            admin_create(&store, new_user("A@sllb.sl", "Admin/HR", None), &admin(), now),
            Err(UserError::Duplicate(_))
        ));
        assert!(matches!(
            admin_create(&store, new_user("not-an-email", "Admin/HR", None), &admin(), now),
            Err(UserError::InvalidEmail)
        ));
        assert!(matches!(
            admin_create(&store, weak, &admin(), now),
            Err(UserError::WeakPassword)
        ));
    }

    #[test]
    fn session_for__should_follow_stored_role_and_status() {
        // Given
        let store = Store::new(MemoryStore::default());
        let now = datetime!(2025-03-10 12:00 UTC);
        admin_create(&store, new_user("m@sllb.sl", "Librarian", Some("Bo")), &admin(), now)
            .expect("create");

        // When
        let active = session_for(&store, "M@sllb.sl").expect("lookup");
        toggle_status(&store, "m@sllb.sl", &admin()).expect("toggle");
        let inactive = session_for(&store, "m@sllb.sl").expect("lookup");
        let unknown = session_for(&store, "gone@sllb.sl").expect("lookup");

        // Then
        let active = active.expect("active session");
        assert_eq!(active.email, "m@sllb.sl");
        assert_eq!(active.role, "Librarian");
        assert!(inactive.is_none());
        assert!(unknown.is_none());
    }

    #[test]
    fn authenticate__should_refuse_inactive_users() {
        // Given
        let store = Store::new(MemoryStore::default());
        let now = datetime!(2025-03-10 12:00 UTC);
        admin_create(&store, new_user("a@sllb.sl", "Admin/HR", None), &admin(), now)
            .expect("create");
        toggle_status(&store, "a@sllb.sl", &admin()).expect("toggle");

        // When
        let session = authenticate(&store, "a@sllb.sl", "correct-horse").expect("auth");

        // Then
        assert!(session.is_none());
    }

    #[test]
    fn list__should_search_name_email_and_role() {
        // Given
        let store = Store::new(MemoryStore::default());
        let now = datetime!(2025-03-10 12:00 UTC);
        admin_create(&store, new_user("a@sllb.sl", "Admin/HR", None), &admin(), now)
            .expect("create");
        admin_create(
            &store,
            new_user("b@sllb.sl", "Branch Librarian", Some("Kenema")),
            &admin(),
            now,
        )
        .expect("create");

        // When
        let branch = list(&store, Some("branch")).expect("list");
        let everyone = list(&store, None).expect("list");

        // Then
        assert_eq!(branch.len(), 1);
        assert_eq!(branch[0].email, "b@sllb.sl");
        assert_eq!(everyone.len(), 2);
    }

    #[test]
    fn delete__should_require_admin() {
        // Given
        let store = Store::new(MemoryStore::default());
        let now = datetime!(2025-03-10 12:00 UTC);
        admin_create(&store, new_user("a@sllb.sl", "Admin/HR", None), &admin(), now)
            .expect("create");
        let user = Session {
            email: "user@sllb.sl".to_string(),
            role: "User".to_string(),
        };

        // When
        let refused = delete(&store, "a@sllb.sl", &user);
        let deleted = delete(&store, "a@sllb.sl", &admin()).expect("delete");

        // Then
        assert!(matches!(refused, Err(UserError::Forbidden)));
        assert!(deleted);
        assert!(list(&store, None).expect("list").is_empty());
    }
}
