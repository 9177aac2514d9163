//! HTTP JSON API.
//!
//! Every entity lives on one path. `GET` selects an operation with the
//! `action` query parameter (default `list`), `POST` with `action` in the
//! query string or the JSON body.

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod invoices;
pub mod notes;
pub mod owners;
pub mod patients;
pub mod request;
pub mod response;
pub mod settings;
pub mod treatments;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::csrf::verify_csrf;
use crate::auth::CurrentUser;
use crate::database::activity::NewActivity;
use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/login", get(auth::login_hint))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/csrf", get(auth::csrf_token).post(auth::regenerate_csrf))
        .route("/api/dashboard", get(dashboard::query))
        .route("/api/owners", get(owners::query).post(owners::mutate))
        .route("/api/patients", get(patients::query).post(patients::mutate))
        .route("/api/appointments", get(appointments::query).post(appointments::mutate))
        .route("/api/treatments", get(treatments::query).post(treatments::mutate))
        .route("/api/invoices", get(invoices::query).post(invoices::mutate))
        .route("/api/notes", get(notes::query).post(notes::mutate))
        .route("/api/documents", get(documents::query).post(documents::mutate))
        .route("/api/settings", get(settings::query).post(settings::mutate))
        .merge(admin::routes())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), verify_csrf))
                .into_inner(),
        )
        .with_state(state)
}

/// Liveness plus a database probe. Answers 503 when the database is unreachable.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, code) = match sqlx::query("SELECT 1").execute(state.database.pool()).await {
        Ok(_) => ("healthy", StatusCode::OK),
        Err(e) => {
            warn!("Health check database probe failed: {}", e);
            ("error", StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let body = serde_json::json!({
        "status": status,
        "service": "tierphysio-manager",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
        "database": { "status": status },
    });
    (code, Json(body))
}

async fn not_found() -> AppError {
    AppError::NotFound("Unbekannter Endpunkt".to_string())
}

/// Write an activity-log entry for a mutation. Failures are logged, not returned.
pub(crate) async fn record_activity(
    state: &AppState,
    user: &CurrentUser,
    action: &str,
    entity_type: &str,
    entity_id: Option<i64>,
    details: Option<Value>,
) {
    let entry = NewActivity {
        user_id: Some(user.id()),
        action,
        entity_type: Some(entity_type),
        entity_id,
        details,
        ip_address: user.ip_address.as_deref(),
    };
    if let Err(e) = state.database.log_activity(entry).await {
        warn!("Failed to record activity {}: {}", action, e);
    }
}

pub(crate) fn unknown_action(action: &str) -> AppError {
    AppError::UnknownAction(action.to_string())
}
