//! Embedded schema migrations.
//!
//! Migrations are applied in order, each inside its own transaction, and
//! recorded in the `migrations` table together with a checksum of their
//! comment-stripped text. Editing an applied migration is an error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::AppError;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial_schema.sql",
        include_str!("../../migrations/001_initial_schema.sql"),
    ),
    (
        "002_seed_defaults.sql",
        include_str!("../../migrations/002_seed_defaults.sql"),
    ),
];

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Split a SQL script into statements on `;`, ignoring semicolons inside
/// quoted strings, quoted identifiers and `--` / `/* */` comments.
/// Comments are dropped from the output.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                current.push(c);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == c {
                        // doubled quote is an escaped quote
                        if chars.peek() == Some(&c) {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        } else {
                            break;
                        }
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                current.push(' ');
            }
            ';' => {
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }

    statements
}

/// SHA-256 over the statements, so whitespace and comment edits do not count.
pub fn checksum(sql: &str) -> String {
    let normalized = split_statements(sql).join(";\n");
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

async fn ensure_migrations_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            name TEXT PRIMARY KEY,
            checksum TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn applied_migrations(
    pool: &SqlitePool,
) -> Result<HashMap<String, (String, DateTime<Utc>)>, AppError> {
    let rows = sqlx::query("SELECT name, checksum, applied_at FROM migrations")
        .fetch_all(pool)
        .await?;

    let mut applied = HashMap::new();
    for row in rows {
        applied.insert(
            row.get::<String, _>("name"),
            (
                row.get::<String, _>("checksum"),
                row.get::<DateTime<Utc>, _>("applied_at"),
            ),
        );
    }
    Ok(applied)
}

/// Apply every pending migration. Returns the names that were applied.
pub async fn run(pool: &SqlitePool) -> Result<Vec<String>, AppError> {
    ensure_migrations_table(pool).await?;
    let applied = applied_migrations(pool).await?;
    let mut newly_applied = Vec::new();

    for (name, sql) in MIGRATIONS {
        let sum = checksum(sql);

        if let Some((stored, _)) = applied.get(*name) {
            if stored != &sum {
                return Err(AppError::DatabaseError(format!(
                    "Migration {} was edited after it had been applied",
                    name
                )));
            }
            debug!("Migration {} already applied", name);
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in split_statements(sql) {
            sqlx::query(&statement).execute(&mut *tx).await.map_err(|e| {
                AppError::DatabaseError(format!("Migration {} failed: {}", name, e))
            })?;
        }

        sqlx::query("INSERT INTO migrations (name, checksum, applied_at) VALUES (?, ?, ?)")
            .bind(*name)
            .bind(&sum)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Applied migration {}", name);
        newly_applied.push(name.to_string());
    }

    Ok(newly_applied)
}

pub async fn status(pool: &SqlitePool) -> Result<Vec<MigrationStatus>, AppError> {
    ensure_migrations_table(pool).await?;
    let applied = applied_migrations(pool).await?;

    Ok(MIGRATIONS
        .iter()
        .map(|(name, _)| MigrationStatus {
            name: name.to_string(),
            applied_at: applied.get(*name).map(|(_, at)| *at),
        })
        .collect())
}
