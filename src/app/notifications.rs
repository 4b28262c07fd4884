use crate::app::{ApiError, api_error, lock_library};
use crate::state;
use crate::types::notifications::{Notification, NotificationFilter};
use crate::types::users::Session;

use axum::Extension;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NotificationQuery {
    #[serde(default)]
    filter: NotificationFilter,
    search: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CountResponse {
    count: usize,
}

pub(crate) async fn notification_list(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.notifications(
        &session,
        query.filter,
        query.search.as_deref(),
    )?))
}

pub(crate) async fn notification_read(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let library = lock_library(&state)?;
    if library.mark_read(&session, &id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "notification not found"))
    }
}

pub(crate) async fn notification_read_all(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<CountResponse>, ApiError> {
    let library = lock_library(&state)?;
    let count = library.mark_all_read(&session)?;
    Ok(Json(CountResponse { count }))
}

pub(crate) async fn notification_delete(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let library = lock_library(&state)?;
    if library.delete_notification(&session, &id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "notification not found"))
    }
}

/// Clears every notification visible to the caller. Admins only.
pub(crate) async fn notification_clear(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<CountResponse>, ApiError> {
    let library = lock_library(&state)?;
    let count = library.delete_all_notifications(&session)?;
    Ok(Json(CountResponse { count }))
}
