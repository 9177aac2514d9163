//! Administration endpoints. Every handler requires the admin role.

pub mod activity;
pub mod backups;
pub mod cron;
pub mod email_templates;
pub mod modules;
pub mod roles;
pub mod users;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(users::query).post(users::mutate))
        .route("/api/admin/roles", get(roles::query).post(roles::mutate))
        .route("/api/admin/backups", get(backups::query).post(backups::mutate))
        .route("/api/admin/cron", get(cron::query).post(cron::mutate))
        .route(
            "/api/admin/email-templates",
            get(email_templates::query).post(email_templates::mutate),
        )
        .route("/api/admin/modules", get(modules::query).post(modules::mutate))
        .route("/api/admin/activity", get(activity::query))
}
