use crate::app::{ApiError, api_error, internal_error, lock_library, trash_response};
use crate::library::UploadRequest;
use crate::state;
use crate::types::documents::{Document, DocumentFilter};
use crate::types::users::Session;
use crate::uploads;

use axum::Extension;
use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

pub(crate) async fn document_list(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.documents(&session, &filter)?))
}

pub(crate) async fn document_inbox(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.inbox(&session)?))
}

pub(crate) async fn document_outbox(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.outbox(&session)?))
}

/// Multipart fields: `file`, `title`, `type`, `folder`, `recipient`, `message`.
pub(crate) async fn document_upload(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> Result<Json<Document>, ApiError> {
    let mut request = UploadRequest::default();
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            request.filename = field
                .file_name()
                .map(|value| value.to_string())
                .filter(|value| !value.trim().is_empty());
            request.content_type = field.content_type().map(|value| value.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|err| api_error(err.status(), err.body_text()))?;
            request.bytes = bytes.to_vec();
            has_file = true;
            continue;
        }
        let value = field
            .text()
            .await
            .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.body_text()))?;
        match name.as_str() {
            "title" => request.title = Some(value),
            "type" => request.doc_type = value,
            "folder" => request.folder = value,
            "recipient" => request.recipient = Some(value),
            "message" => request.message = value,
            _ => {}
        }
    }

    if !has_file {
        return Err(api_error(StatusCode::BAD_REQUEST, "a file is required"));
    }

    let library = lock_library(&state)?;
    Ok(Json(library.upload(&session, request)?))
}

pub(crate) async fn document_file(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (doc, path) = {
        let library = lock_library(&state)?;
        library.document_file(&session, &id)?
    };

    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(api_error(StatusCode::NOT_FOUND, "file not found"));
        }
        Err(err) => return Err(internal_error(err)),
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        uploads::download_name(&doc.title, &doc.file_ref)
    );
    Ok((
        [
            (CONTENT_TYPE, uploads::content_type_for_path(&doc.file_ref).to_string()),
            (CONTENT_DISPOSITION, disposition),
            (CACHE_CONTROL, "private, no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}

pub(crate) async fn document_trash(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let library = lock_library(&state)?;
    trash_response(library.request_trash(&session, &id)?)
}
