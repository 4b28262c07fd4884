use crate::app::folders::SearchQuery;
use crate::app::{ApiError, lock_library};
use crate::state;
use crate::types::users::{NewUser, Session, UserSummary};

use axum::Extension;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

pub(crate) async fn user_list(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.users(&session, query.search.as_deref())?))
}

pub(crate) async fn user_create(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Json(new): Json<NewUser>,
) -> Result<(StatusCode, Json<UserSummary>), ApiError> {
    let library = lock_library(&state)?;
    let user = library.create_user(&session, new)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(crate) async fn user_toggle(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(email): Path<String>,
) -> Result<Json<UserSummary>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.toggle_user(&session, &email)?))
}

pub(crate) async fn user_delete(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(email): Path<String>,
) -> Result<StatusCode, ApiError> {
    let library = lock_library(&state)?;
    library.delete_user(&session, &email)?;
    Ok(StatusCode::NO_CONTENT)
}
