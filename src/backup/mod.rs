//! SQL dump backups of the practice data.
//!
//! A backup file starts with [`BACKUP_HEADER`] followed by one `INSERT`
//! statement per row, table by table in foreign-key order. Restores only
//! accept `INSERT INTO` statements against known data tables.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::BackupConfig;
use crate::database::migrations::split_statements;
use crate::database::models::BackupRecord;
use crate::database::schema::{is_data_table, DATA_TABLES};
use crate::database::Database;
use crate::error::AppError;

pub const BACKUP_HEADER: &str = "-- tierphysio-manager backup v1";

#[derive(Clone)]
pub struct BackupManager {
    database: Database,
    directory: PathBuf,
    keep: usize,
}

pub fn file_checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("tierphysio-backup-{}.sql", at.format("%Y%m%d-%H%M%S"))
}

fn quote_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn sql_literal(row: &SqliteRow, index: usize) -> Result<String, AppError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok("NULL".to_string());
    }
    let kind = raw.type_info().name().to_string();

    Ok(match kind.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index)?.to_string(),
        "REAL" => format!("{:?}", row.try_get::<f64, _>(index)?),
        "BLOB" => format!("X'{}'", hex::encode(row.try_get::<Vec<u8>, _>(index)?)),
        _ => quote_text(&row.try_get::<String, _>(index)?),
    })
}

/// Render every data table as `INSERT` statements.
pub async fn dump(database: &Database) -> Result<String, AppError> {
    let mut out = String::new();
    out.push_str(BACKUP_HEADER);
    out.push('\n');
    out.push_str(&format!("-- created {}\n", Utc::now().to_rfc3339()));

    for table in DATA_TABLES {
        let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY rowid", table))
            .fetch_all(database.pool())
            .await?;
        if rows.is_empty() {
            continue;
        }

        out.push_str(&format!("\n-- {}\n", table));
        for row in &rows {
            let columns: Vec<&str> = row.columns().iter().map(|c| c.name()).collect();
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(sql_literal(row, index)?);
            }
            out.push_str(&format!(
                "INSERT INTO {} ({}) VALUES ({});\n",
                table,
                columns.join(", "),
                values.join(", ")
            ));
        }
    }

    Ok(out)
}

/// Table targeted by an `INSERT INTO` statement, if it is one.
fn insert_target(statement: &str) -> Option<&str> {
    let trimmed = statement.trim_start();
    let prefix = trimmed.get(..12)?;
    if !prefix.eq_ignore_ascii_case("INSERT INTO ") {
        return None;
    }
    let rest = trimmed[12..].trim_start();
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Check a dump and return its statements, ready to replay.
pub fn parse_dump(contents: &str) -> Result<Vec<String>, AppError> {
    if contents.lines().next().map(str::trim_end) != Some(BACKUP_HEADER) {
        return Err(AppError::BackupError(
            "Datei ist keine tierphysio-manager-Sicherung".to_string(),
        ));
    }

    let statements = split_statements(contents);
    for statement in &statements {
        match insert_target(statement) {
            Some(table) if is_data_table(table) => {}
            _ => {
                let preview: String = statement.chars().take(60).collect();
                return Err(AppError::BackupError(format!(
                    "Anweisung wird nicht eingespielt: {}",
                    preview
                )));
            }
        }
    }
    Ok(statements)
}

impl BackupManager {
    pub fn new(database: Database, config: &BackupConfig) -> Self {
        Self {
            database,
            directory: PathBuf::from(&config.directory),
            keep: config.keep,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub async fn list(&self) -> Result<Vec<BackupRecord>, AppError> {
        Ok(sqlx::query_as::<_, BackupRecord>(
            "SELECT * FROM backups ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.database.pool())
        .await?)
    }

    pub async fn get(&self, id: i64) -> Result<BackupRecord, AppError> {
        sqlx::query_as::<_, BackupRecord>("SELECT * FROM backups WHERE id = ?")
            .bind(id)
            .fetch_optional(self.database.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Sicherung", id))
    }

    async fn unused_path(&self, now: DateTime<Utc>) -> (String, PathBuf) {
        let base = backup_file_name(now);
        let mut name = base.clone();
        let mut n = 1;
        while tokio::fs::try_exists(self.directory.join(&name))
            .await
            .unwrap_or(false)
        {
            name = base.replace(".sql", &format!("-{}.sql", n));
            n += 1;
        }
        let path = self.directory.join(&name);
        (name, path)
    }

    /// Write a new dump, register it and apply retention.
    pub async fn create(&self, created_by: Option<i64>) -> Result<BackupRecord, AppError> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let contents = dump(&self.database).await?;
        let now = Utc::now();
        let (filename, path) = self.unused_path(now).await;
        tokio::fs::write(&path, contents.as_bytes()).await?;

        let id = sqlx::query(
            "INSERT INTO backups (filename, size_bytes, checksum, created_by, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&filename)
        .bind(contents.len() as i64)
        .bind(file_checksum(contents.as_bytes()))
        .bind(created_by)
        .bind(now)
        .execute(self.database.pool())
        .await?
        .last_insert_rowid();

        info!("Backup written to {}", path.display());
        self.apply_retention().await?;
        self.get(id).await
    }

    /// Delete all but the newest `keep` backups.
    pub async fn apply_retention(&self) -> Result<Vec<String>, AppError> {
        let mut removed = Vec::new();
        for record in self.list().await?.into_iter().skip(self.keep) {
            self.remove(&record).await?;
            removed.push(record.filename);
        }
        Ok(removed)
    }

    async fn remove(&self, record: &BackupRecord) -> Result<(), AppError> {
        match tokio::fs::remove_file(self.directory.join(&record.filename)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Backup file {} already gone", record.filename);
            }
            Err(e) => return Err(e.into()),
        }
        sqlx::query("DELETE FROM backups WHERE id = ?")
            .bind(record.id)
            .execute(self.database.pool())
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let record = self.get(id).await?;
        self.remove(&record).await
    }

    /// Replace all practice data with the contents of a backup.
    ///
    /// Active sessions are dropped along with the user rows they belong to.
    pub async fn restore(&self, id: i64) -> Result<usize, AppError> {
        let record = self.get(id).await?;
        let bytes = tokio::fs::read(self.directory.join(&record.filename)).await?;
        if file_checksum(&bytes) != record.checksum {
            return Err(AppError::BackupError(format!(
                "Prüfsumme stimmt nicht für {}",
                record.filename
            )));
        }
        let contents = String::from_utf8(bytes)
            .map_err(|_| AppError::BackupError("Sicherung ist kein gültiges UTF-8".to_string()))?;
        let statements = parse_dump(&contents)?;

        let mut tx = self.database.pool().begin().await?;
        sqlx::query("PRAGMA defer_foreign_keys = ON")
            .execute(&mut *tx)
            .await?;
        for table in DATA_TABLES.iter().rev() {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        for statement in &statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!(
            "Restored backup {} ({} statements)",
            record.filename,
            statements.len()
        );
        Ok(statements.len())
    }
}
