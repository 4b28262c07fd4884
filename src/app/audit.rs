use crate::app::{ApiError, api_error, lock_library};
use crate::audit::{Page, PageSize};
use crate::state;
use crate::types::audit::AuditEntry;
use crate::types::users::Session;

use axum::Extension;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditQuery {
    search: Option<String>,
    page: Option<usize>,
    page_size: Option<String>,
}

pub(crate) async fn audit_list(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Page<AuditEntry>>, ApiError> {
    let size = match query.page_size.as_deref() {
        Some(raw) => raw
            .parse::<PageSize>()
            .map_err(|err| api_error(StatusCode::BAD_REQUEST, err))?,
        None => PageSize::default(),
    };
    let library = lock_library(&state)?;
    Ok(Json(library.audit_logs(
        &session,
        query.search.as_deref(),
        query.page.unwrap_or(1),
        size,
    )?))
}

pub(crate) async fn audit_export(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<AuditQuery>,
) -> Result<Response, ApiError> {
    let csv = {
        let library = lock_library(&state)?;
        library.audit_csv(&session, query.search.as_deref())?
    };
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=\"audit_logs.csv\""),
        ],
        csv,
    )
        .into_response())
}
