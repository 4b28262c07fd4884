use crate::app::{ErrorResponse, internal_error, lock_library};
use crate::auth::CookieLifetime;
use crate::state;
use crate::templates;

use axum::Json;
use axum::body::Body;
use axum::extract::Form;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

/// Verifies the session cookie, re-reads the user record, and hands the
/// [`Session`](crate::types::users::Session) to handlers as a request extension.
pub(crate) async fn auth_middleware(
    State(state): State<state::AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if is_auth_bypass_path(&path) {
        return next.run(req).await;
    }

    if let Some(token) = auth_cookie(req.headers(), state.auth.cookie_name())
        && let Ok(claimed) = state.auth.verify_token(token)
    {
        let current = {
            let library = match lock_library(&state) {
                Ok(library) => library,
                Err(err) => return err.into_response(),
            };
            library.session_for(&claimed.email)
        };
        match current {
            Ok(Some(session)) => {
                req.extensions_mut().insert(session);
                return next.run(req).await;
            }
            Ok(None) => warn!(email = %claimed.email, "session refused: user removed or inactive"),
            Err(err) => return internal_error(err).into_response(),
        }
    }

    if path.starts_with("/api/") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
            }),
        )
            .into_response();
    }

    Redirect::to("/login").into_response()
}

fn is_auth_bypass_path(path: &str) -> bool {
    path == "/login" || path == "/logout" || path == "/health" || path.starts_with("/static/")
}

fn auth_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for header in headers.get_all(COOKIE).iter() {
        if let Ok(raw) = header.to_str()
            && let Some(value) = cookie_from_header(raw, name)
        {
            return Some(value);
        }
    }
    None
}

fn cookie_from_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let trimmed = part.trim();
        if let Some((cookie_name, cookie_value)) = trimmed.split_once('=')
            && cookie_name == name
        {
            return Some(cookie_value);
        }
    }
    None
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginForm {
    email: String,
    password: String,
    remember: Option<String>,
    next: Option<String>,
}

pub(crate) async fn login_form(
    State(state): State<state::AppState>,
    Query(query): Query<LoginQuery>,
) -> templates::LoginTemplate {
    let next = sanitize_next(query.next.as_deref()).unwrap_or_else(|| "/".to_string());
    templates::LoginTemplate {
        app_name: state.config.app_name,
        error: String::new(),
        email: String::new(),
        next,
    }
}

pub(crate) async fn login_submit(
    State(state): State<state::AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, (StatusCode, templates::LoginTemplate)> {
    let email = form.email.trim().to_string();
    let next = sanitize_next(form.next.as_deref()).unwrap_or_else(|| "/".to_string());
    let page = |status: StatusCode, message: &str| {
        (
            status,
            templates::LoginTemplate {
                app_name: state.config.app_name.clone(),
                error: message.to_string(),
                email: email.clone(),
                next: next.clone(),
            },
        )
    };

    if email.is_empty() || form.password.trim().is_empty() {
        return Err(page(StatusCode::UNAUTHORIZED, "Invalid email or password."));
    }

    let authenticated = {
        let library = lock_library(&state)
            .map_err(|_| page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in."))?;
        library.authenticate(&email, &form.password)
    };
    let session = match authenticated {
        Ok(Some(session)) => session,
        Ok(None) => {
            warn!(email = %email, "failed sign-in");
            return Err(page(StatusCode::UNAUTHORIZED, "Invalid email or password."));
        }
        Err(err) => {
            error!(error = %err, "failed to load users");
            return Err(page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in."));
        }
    };

    let lifetime = if is_checked(form.remember.as_deref()) {
        CookieLifetime::Remembered
    } else {
        CookieLifetime::BrowserSession
    };
    let cookie = state
        .auth
        .issue_token(&session)
        .map(|token| state.auth.auth_cookie(&token, lifetime))
        .map_err(|err| err.to_string())
        .and_then(|cookie| HeaderValue::from_str(&cookie).map_err(|err| err.to_string()));
    let cookie = match cookie {
        Ok(cookie) => cookie,
        Err(err) => {
            error!(error = %err, "failed to issue auth cookie");
            return Err(page(StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in."));
        }
    };

    info!(email = %session.email, role = %session.role, "signed in");
    let mut response = Redirect::to(&next).into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

pub(crate) async fn logout(State(state): State<state::AppState>) -> Response {
    let mut response = Redirect::to("/login").into_response();
    match HeaderValue::from_str(&state.auth.clear_cookie()) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(err) => error!(error = %err, "failed to build logout cookie"),
    }
    response
}

fn is_checked(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim),
        Some("on") | Some("true") | Some("1") | Some("yes")
    )
}

fn sanitize_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    if next.is_empty() {
        return None;
    }
    if !next.starts_with('/') || next.starts_with("//") || next.contains("://") {
        return None;
    }
    Some(next.to_string())
}
