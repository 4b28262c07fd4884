use crate::app::{ApiError, lock_library};
use crate::folders::FolderListing;
use crate::state;
use crate::types::folders::{Folder, NewFolder};
use crate::types::users::Session;

use axum::Extension;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchQuery {
    pub(crate) search: Option<String>,
}

pub(crate) async fn folder_list(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<FolderListing>>, ApiError> {
    let library = lock_library(&state)?;
    Ok(Json(library.folders(&session, query.search.as_deref())?))
}

pub(crate) async fn folder_create(
    State(state): State<state::AppState>,
    Extension(session): Extension<Session>,
    Json(new): Json<NewFolder>,
) -> Result<(StatusCode, Json<Folder>), ApiError> {
    let library = lock_library(&state)?;
    let folder = library.create_folder(&session, new)?;
    Ok((StatusCode::CREATED, Json(folder)))
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::app::app;
    use crate::app::tests::{create_temp_root, get_request, json_body, session_cookie, test_config};

    use axum::body::Body;
    use axum::http::header::{CONTENT_TYPE, COOKIE};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn create_request(cookie: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/folders")
            .header(COOKIE, cookie)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn folder_create__should_add_restricted_folder_for_admin() {
        // Given
        let root = create_temp_root("folder-create");
        let config = test_config(root.clone());
        let admin = session_cookie(&config, "admin@sllb.sl", "Admin/HR");
        let outsider = session_cookie(&config, "clerk@sllb.sl", "User");
        let app = app(config).expect("app");

        // When
        let created = app
            .clone()
            .oneshot(create_request(
                &admin,
                r#"{"name":"Board Minutes","allowedUsers":["secretary@sllb.sl"]}"#,
            ))
            .await
            .expect("create failed");
        let listed = app
            .oneshot(get_request("/api/folders?search=board", &outsider))
            .await
            .expect("list failed");

        // Then
        assert_eq!(created.status(), StatusCode::CREATED);
        let payload = json_body(created).await;
        assert_eq!(payload["name"], "Board Minutes");
        assert_eq!(payload["ownerId"], "admin@sllb.sl");

        assert_eq!(listed.status(), StatusCode::OK);
        let listing = json_body(listed).await;
        assert_eq!(listing, serde_json::json!([]));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn folder_create__should_forbid_non_admins() {
        // Given
        let root = create_temp_root("folder-create-forbidden");
        let config = test_config(root.clone());
        let cookie = session_cookie(&config, "clerk@sllb.sl", "User");

        // When
        let response = app(config)
            .expect("app")
            .oneshot(create_request(&cookie, r#"{"name":"Private"}"#))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }
}
