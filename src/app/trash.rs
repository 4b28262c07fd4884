use crate::app::{ApiError, api_error, internal_error, lock_library, trash_response};
use crate::state;
use crate::trash::{BulkOutcome, TrashOutcome};
use crate::types::documents::Document;
use crate::types::users::Session;

use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct Selection {
    ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkResponse {
    applied: Vec<String>,
    skipped: Vec<String>,
}

impl From<BulkOutcome> for BulkResponse {
    fn from(outcome: BulkOutcome) -> Self {
        Self {
            applied: outcome.applied,
            skipped: outcome.skipped,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EmptyResponse {
    removed: usize,
}

pub(crate) async fn trash_list(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.trash(&session)?))
}

pub(crate) async fn trash_approve(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let library = lock_library(&state)?;
    trash_response(library.approve_trash(&session, &id)?)
}

pub(crate) async fn trash_reject(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let library = lock_library(&state)?;
    trash_response(library.reject_trash(&session, &id)?)
}

pub(crate) async fn trash_restore(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let library = lock_library(&state)?;
    trash_response(library.restore(&session, &id)?)
}

pub(crate) async fn trash_delete(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let library = lock_library(&state)?;
    trash_response(library.delete_permanently(&session, &id)?)
}

pub(crate) async fn trash_restore_many(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Json(selection): Json<Selection>,
) -> Result<Json<BulkResponse>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.restore_many(&session, &selection.ids)?.into()))
}

pub(crate) async fn trash_delete_many(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Json(selection): Json<Selection>,
) -> Result<Json<BulkResponse>, ApiError> {
    let library = lock_library(&state)?;
    match library.delete_many(&session, &selection.ids)? {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(refused) => Err(refused_bulk(refused)),
    }
}

pub(crate) async fn trash_empty(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let library = lock_library(&state)?;
    match library.empty_trash(&session)? {
        Ok(removed) => Ok(Json(EmptyResponse { removed })),
        Err(refused) => Err(refused_bulk(refused)),
    }
}

fn refused_bulk(outcome: TrashOutcome) -> ApiError {
    match outcome {
        TrashOutcome::Blocked => api_error(
            StatusCode::CONFLICT,
            "selection includes documents awaiting sender approval",
        ),
        other => trash_response(other)
            .err()
            .unwrap_or_else(|| internal_error("bulk trash action reported success as a refusal")),
    }
}
