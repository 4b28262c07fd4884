use crate::adapters::{FileStore, SystemTimeProvider};
use crate::assets;
use crate::auth::{AuthError, AuthState};
use crate::config::{self, MAX_UPLOAD_BYTES};
use crate::library::{Library, LibraryError};
use crate::seed::{SeedError, SeedFile};
use crate::state;
use crate::store::StoreError;
use crate::trash::TrashOutcome;
use crate::uploads::UploadError;
use crate::users::UserError;
use crate::folders::FolderError;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{delete, get, post};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::error;

mod audit;
mod auth;
mod dashboard;
mod documents;
mod folders;
mod notifications;
mod trash;
mod users;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid auth configuration: {0}")]
    Auth(#[from] AuthError),
    #[error("failed to open data directory: {0}")]
    DataDir(#[source] std::io::Error),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error("failed to apply seed: {0}")]
    Store(#[from] StoreError),
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub fn app(config: config::AppConfig) -> Result<Router, StartupError> {
    let auth = AuthState::from_config(&config)?;
    let backend = FileStore::open(&config.data_dir).map_err(StartupError::DataDir)?;
    let library = Library::new(backend, SystemTimeProvider, config.data_dir.clone());
    if let Some(path) = config.seed.as_deref() {
        library.apply_seed(&SeedFile::load(path)?)?;
    }
    let state = state::AppState {
        config,
        auth,
        library: Arc::new(Mutex::new(library)),
    };

    Ok(Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/login", get(auth::login_form).post(auth::login_submit))
        .route("/logout", post(auth::logout))
        .route(
            "/api/folders",
            get(folders::folder_list).post(folders::folder_create),
        )
        .route("/api/users", get(users::user_list))
        .route("/api/users/admin-create", post(users::user_create))
        .route("/api/users/{email}/toggle", post(users::user_toggle))
        .route("/api/users/{email}", delete(users::user_delete))
        .route(
            "/api/documents",
            get(documents::document_list)
                .post(documents::document_upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
        .route("/api/documents/inbox", get(documents::document_inbox))
        .route("/api/documents/outbox", get(documents::document_outbox))
        .route("/api/documents/{id}/file", get(documents::document_file))
        .route("/api/documents/{id}/trash", post(documents::document_trash))
        .route(
            "/api/trash",
            get(trash::trash_list).delete(trash::trash_empty),
        )
        .route("/api/trash/restore", post(trash::trash_restore_many))
        .route("/api/trash/delete", post(trash::trash_delete_many))
        .route("/api/trash/{id}/approve", post(trash::trash_approve))
        .route("/api/trash/{id}/reject", post(trash::trash_reject))
        .route("/api/trash/{id}/restore", post(trash::trash_restore))
        .route("/api/trash/{id}", delete(trash::trash_delete))
        .route(
            "/api/notifications",
            get(notifications::notification_list).delete(notifications::notification_clear),
        )
        .route(
            "/api/notifications/read-all",
            post(notifications::notification_read_all),
        )
        .route(
            "/api/notifications/{id}/read",
            post(notifications::notification_read),
        )
        .route(
            "/api/notifications/{id}",
            delete(notifications::notification_delete),
        )
        .route("/api/audit-logs", get(audit::audit_list))
        .route("/api/audit-logs/export", get(audit::audit_export))
        .route("/static/style.css", get(assets::stylesheet))
        .route("/health", get(health))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware)))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn internal_error(err: impl std::fmt::Display) -> ApiError {
    error!(error = %err, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

pub(crate) fn lock_library(
    state: &state::AppState,
) -> Result<MutexGuard<'_, Library<FileStore, SystemTimeProvider>>, ApiError> {
    state
        .library
        .lock()
        .map_err(|_| internal_error("library lock poisoned"))
}

impl From<StoreError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: StoreError) -> Self {
        internal_error(err)
    }
}

impl From<LibraryError> for (StatusCode, Json<ErrorResponse>) {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::MissingFolder => api_error(StatusCode::BAD_REQUEST, err.to_string()),
            LibraryError::Forbidden => api_error(StatusCode::FORBIDDEN, err.to_string()),
            LibraryError::NotFound => api_error(StatusCode::NOT_FOUND, err.to_string()),
            LibraryError::Upload(err) => match err {
                UploadError::EmptyBody | UploadError::BadPath => {
                    api_error(StatusCode::BAD_REQUEST, err.to_string())
                }
                UploadError::NotFound => api_error(StatusCode::NOT_FOUND, err.to_string()),
                UploadError::TooLarge => api_error(StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
                UploadError::UnsupportedType => {
                    api_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, err.to_string())
                }
                UploadError::Io(err) => internal_error(err),
            },
            LibraryError::User(err) => match err {
                UserError::Forbidden => api_error(StatusCode::FORBIDDEN, err.to_string()),
                UserError::Duplicate(_) => api_error(StatusCode::CONFLICT, err.to_string()),
                UserError::Hash | UserError::Store(_) => internal_error(err),
                _ => api_error(StatusCode::BAD_REQUEST, err.to_string()),
            },
            LibraryError::Folder(err) => match err {
                FolderError::Forbidden => api_error(StatusCode::FORBIDDEN, err.to_string()),
                FolderError::Duplicate(_) => api_error(StatusCode::CONFLICT, err.to_string()),
                FolderError::MissingName => api_error(StatusCode::BAD_REQUEST, err.to_string()),
                FolderError::Store(err) => internal_error(err),
            },
            LibraryError::Store(err) => internal_error(err),
            LibraryError::Export(err) => internal_error(err),
        }
    }
}

/// Refused transitions become client errors; applied ones hand back the document.
pub(crate) fn trash_response(
    outcome: TrashOutcome,
) -> Result<Json<crate::types::documents::Document>, ApiError> {
    match outcome {
        TrashOutcome::Applied(doc) => Ok(Json(doc)),
        TrashOutcome::NotFound => Err(api_error(StatusCode::NOT_FOUND, "document not found")),
        TrashOutcome::InvalidState(status) => Err(api_error(
            StatusCode::CONFLICT,
            format!("document is {}", status.label()),
        )),
        TrashOutcome::Blocked => Err(api_error(
            StatusCode::CONFLICT,
            "awaiting sender approval",
        )),
        TrashOutcome::Forbidden => Err(api_error(StatusCode::FORBIDDEN, "not permitted")),
    }
}
