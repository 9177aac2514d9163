use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::request::SingleAction;
use super::response::{success, success_with_message, ApiResponse, ApiResult};
use crate::auth::guard::{expired_session_cookie, session_cookie, ClientIp};
use crate::auth::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    identifier: String,
    password: String,
}

/// Where and how to log in. There is no server-rendered login page.
pub async fn login_hint(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "data": {
            "login_url": "/api/auth/login",
            "method": "POST",
            "fields": ["username", "password"],
            "login_path": state.config.auth.login_path,
        },
        "message": "Bitte melden Sie sich an.",
    }))
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: SingleAction,
) -> ApiResult {
    let credentials: LoginRequest = serde_json::from_value(Value::Object(body.expect("login")?))?;

    let (session, user) = state
        .auth
        .login(&credentials.identifier, &credentials.password, ip.as_deref())
        .await?;
    let permissions = state.auth.permissions_for(&user).await?;

    let cookie = session_cookie(&state.config.session, &session.id);
    let body = ApiResponse::with_message(
        json!({
            "user": user,
            "permissions": permissions,
            "csrf_token": session.csrf_token,
        }),
        "Anmeldung erfolgreich",
    );
    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

pub async fn logout(State(state): State<AppState>, user: CurrentUser, body: SingleAction) -> ApiResult {
    body.expect("logout")?;
    state.auth.logout(&user.session.id).await?;

    let cookie = expired_session_cookie(&state.config.session);
    let body = ApiResponse::with_message(Value::Null, "Abgemeldet");
    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult {
    let permissions = state.auth.permissions_for(&user.user).await?;
    success(json!({
        "user": user.user,
        "permissions": permissions,
        "session_expires_at": user.session.expires_at,
    }))
}

pub async fn csrf_token(user: CurrentUser) -> ApiResult {
    success(json!({ "csrf_token": user.session.csrf_token }))
}

pub async fn regenerate_csrf(State(state): State<AppState>, user: CurrentUser, body: SingleAction) -> ApiResult {
    body.expect("regenerate")?;
    let token = state.auth.regenerate_csrf(&user.session.id).await?;
    success_with_message(json!({ "csrf_token": token }), "CSRF-Token erneuert")
}
