use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;
use tracing::warn;

use super::guard::session_id_from_headers;
use crate::error::AppError;
use crate::state::AppState;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_FIELD: &str = "csrf_token";

/// Paths that accept a POST without a token.
const EXEMPT_PATHS: &[&str] = &["/api/auth/login"];

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.len() == provided.len() && bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
}

fn token_from_body(bytes: &[u8]) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()?
        .get(CSRF_FIELD)?
        .as_str()
        .map(str::to_string)
}

/// Reject mutating API requests from a live session without its CSRF token.
///
/// Requests without a session pass through so the route guard answers 401.
pub async fn verify_csrf(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    if request.method() != Method::POST
        || !path.starts_with("/api/")
        || EXEMPT_PATHS.contains(&path)
    {
        return Ok(next.run(request).await);
    }

    let Some(session_id) = session_id_from_headers(request.headers(), &state.config.session.cookie_name)
    else {
        return Ok(next.run(request).await);
    };
    let session = match state.auth.sessions().get(&session_id).await? {
        Some(session) if !session.is_expired(chrono::Utc::now()) => session,
        _ => return Ok(next.run(request).await),
    };

    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (token, request) = match header_token {
        Some(token) => (Some(token), request),
        None => {
            let (parts, body) = request.into_parts();
            let bytes = to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| AppError::ValidationError(format!("Anfrage konnte nicht gelesen werden: {}", e)))?;
            let token = token_from_body(&bytes);
            (token, Request::from_parts(parts, Body::from(bytes)))
        }
    };

    match token {
        Some(token) if tokens_match(&session.csrf_token, &token) => Ok(next.run(request).await),
        _ => {
            warn!("CSRF check failed for {} (user {})", request.uri().path(), session.user_id);
            Err(AppError::CsrfMismatch)
        }
    }
}
