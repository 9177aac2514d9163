pub mod activity;
pub mod appointments;
pub mod cron_jobs;
pub mod dashboard;
pub mod documents;
pub mod email_templates;
pub mod invoices;
pub mod migrations;
pub mod models;
pub mod modules;
pub mod notes;
pub mod owners;
pub mod patients;
pub mod schema;
pub mod settings;
pub mod treatments;
pub mod users;

#[cfg(test)]
pub(crate) mod fixtures;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::AppError;

/// Shared handle to the practice database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        Ok(Database { pool })
    }

    /// Migrated in-memory database. Every connection to `:memory:` is a
    /// separate database, so the pool is pinned to one long-lived connection.
    pub async fn new_in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::ConfigError(format!("Invalid database URL: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Database { pool };
        database.run_migrations().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<Vec<String>, AppError> {
        migrations::run(&self.pool).await
    }

    pub async fn migration_status(&self) -> Result<Vec<migrations::MigrationStatus>, AppError> {
        migrations::status(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Trim an optional text field, mapping blank input to `None`.
pub(crate) fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Require a non-blank text field.
pub(crate) fn required(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::missing_field(field));
    }
    Ok(trimmed.to_string())
}

/// Syntactic email check only.
pub(crate) fn valid_email(value: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
        })
        .is_match(value)
}

/// Clamp a caller-supplied page size.
pub(crate) fn page_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 500)
}
