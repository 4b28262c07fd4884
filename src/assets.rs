use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;

pub(crate) async fn stylesheet() -> impl IntoResponse {
    const CSS_CONTENT: &str = include_str!("../static/style.css");
    (
        [
            (CONTENT_TYPE, "text/css"),
            (CACHE_CONTROL, "public, max-age=3600"),
        ],
        CSS_CONTENT,
    )
}
