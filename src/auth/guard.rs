//! Route guards and session cookie handling.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use std::net::SocketAddr;

use super::session::Session;
use crate::config::SessionConfig;
use crate::database::models::User;
use crate::database::users::ADMIN_ROLE;
use crate::error::AppError;
use crate::state::AppState;

/// Read the session id from the `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(config: &SessionConfig, session_id: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name,
        session_id,
        config.lifetime_minutes * 60
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie(config: &SessionConfig) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie_name
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Client address, preferring the first `X-Forwarded-For` hop.
pub fn client_ip(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

/// Client address for requests that may not carry a session.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts)))
    }
}

fn prefers_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html") && !accept.contains("application/json"))
        .unwrap_or(false)
}

/// Guard failure: a JSON error envelope, or a redirect for browsers.
#[derive(Debug)]
pub enum AuthRejection {
    Error(AppError),
    Redirect(String),
}

impl From<AppError> for AuthRejection {
    fn from(err: AppError) -> Self {
        AuthRejection::Error(err)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Error(err) => err.into_response(),
            AuthRejection::Redirect(to) => Redirect::to(&to).into_response(),
        }
    }
}

/// The logged-in user behind the request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
    pub ip_address: Option<String>,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.role_name == ADMIN_ROLE
    }

    /// Fail with 403 unless the user holds `permission`.
    pub async fn require(&self, state: &AppState, permission: &str) -> Result<(), AppError> {
        if state.auth.has_permission(&self.user, permission).await? {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Fehlende Berechtigung {}", permission)))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let resolved = match session_id_from_headers(&parts.headers, &state.config.session.cookie_name) {
            Some(session_id) => state.auth.authenticate(&session_id).await?,
            None => None,
        };

        match resolved {
            Some((session, user)) => Ok(CurrentUser {
                user,
                session,
                ip_address: client_ip(parts),
            }),
            None if prefers_html(&parts.headers) => {
                Err(AuthRejection::Redirect(state.config.auth.login_path.clone()))
            }
            None => Err(AuthRejection::Error(AppError::Unauthorized)),
        }
    }
}

/// A logged-in user with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.is_admin() {
            return Err(AuthRejection::Error(AppError::Forbidden(
                "Administratorrechte erforderlich".to_string(),
            )));
        }
        Ok(AdminUser(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; tierphysio_session=abc123; lang=de"),
        );
        assert_eq!(
            session_id_from_headers(&headers, "tierphysio_session").as_deref(),
            Some("abc123")
        );
        assert_eq!(session_id_from_headers(&headers, "other"), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let mut config = crate::config::AppConfig::default().session;
        let cookie = session_cookie(&config, "abc");
        assert!(cookie.starts_with("tierphysio_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));

        config.secure_cookie = true;
        assert!(expired_session_cookie(&config).contains("Max-Age=0; Secure"));
    }

    #[test]
    fn test_prefers_html() {
        let mut headers = HeaderMap::new();
        assert!(!prefers_html(&headers));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html,*/*"));
        assert!(prefers_html(&headers));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json, text/html"));
        assert!(!prefers_html(&headers));
    }
}
