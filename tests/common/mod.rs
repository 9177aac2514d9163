//! Shared fixtures for the HTTP integration tests.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use tierphysio_manager::api;
use tierphysio_manager::auth::password::hash_password;
use tierphysio_manager::auth::MemorySessionStore;
use tierphysio_manager::config::AppConfig;
use tierphysio_manager::database::models::User;
use tierphysio_manager::database::users::UserRecord;
use tierphysio_manager::database::Database;
use tierphysio_manager::state::AppState;

pub const PASSWORD: &str = "geheim123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _backup_dir: TempDir,
}

/// Cookie and CSRF token of a logged-in client.
pub struct Login {
    pub cookie: String,
    pub csrf: String,
}

pub async fn spawn_app() -> TestApp {
    let backup_dir = tempfile::tempdir().expect("temp dir");
    let mut config = AppConfig::default();
    config.auth.bcrypt_cost = 4;
    config.cron.enabled = false;
    config.backup.directory = backup_dir.path().to_string_lossy().into_owned();

    let database = Database::new_in_memory().await.expect("in-memory database");
    let state = AppState::new(config, database, Arc::new(MemorySessionStore::new()));

    TestApp {
        router: api::router(state.clone()),
        state,
        _backup_dir: backup_dir,
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("JSON body")
}

impl TestApp {
    pub async fn create_user(&self, username: &str, role: &str) -> User {
        let hash = hash_password(PASSWORD, 4).await.expect("hash");
        self.state
            .database
            .create_user(&UserRecord {
                username: username.to_string(),
                email: format!("{}@praxis.example", username),
                password_hash: Some(hash),
                first_name: "Test".to_string(),
                last_name: username.to_string(),
                role: role.to_string(),
                is_active: true,
            })
            .await
            .expect("create user")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("router is infallible")
    }

    pub async fn login(&self, username: &str) -> Login {
        let response = self
            .send(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"username": username, "password": PASSWORD}).to_string(),
                    ))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .expect("session cookie")
            .to_string();
        let body = body_json(response).await;
        let csrf = body["data"]["csrf_token"].as_str().expect("csrf token").to_string();

        Login { cookie, csrf }
    }

    /// Create a user with `role` and log them in.
    pub async fn login_as(&self, username: &str, role: &str) -> Login {
        self.create_user(username, role).await;
        self.login(username).await
    }

    pub async fn get(&self, uri: &str, login: Option<&Login>) -> (StatusCode, Value) {
        let mut request = Request::get(uri).header(header::ACCEPT, "application/json");
        if let Some(login) = login {
            request = request.header(header::COOKIE, &login.cookie);
        }
        let response = self.send(request.body(Body::empty()).unwrap()).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// POST with the session's CSRF token in the header.
    pub async fn post(&self, uri: &str, login: &Login, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, &login.cookie)
            .header("x-csrf-token", &login.csrf)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn create_owner(&self, login: &Login, last_name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/owners",
                login,
                json!({"action": "create", "first_name": "Maria", "last_name": last_name}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn create_patient(&self, login: &Login, owner_id: i64, name: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/patients",
                login,
                json!({"action": "create", "owner_id": owner_id, "name": name, "species": "Hund"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_i64().unwrap()
    }
}

pub fn assert_error_envelope(body: &Value) {
    assert_eq!(body["status"], "error", "{}", body);
    assert!(body["message"].is_string(), "{}", body);
}
