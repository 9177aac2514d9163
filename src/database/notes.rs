use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use super::models::Note;
use super::{page_limit, required, Database};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteInput {
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub owner_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteFilter {
    pub patient_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Database {
    pub async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM notes WHERE 1 = 1");
        if let Some(patient_id) = filter.patient_id {
            query.push(" AND patient_id = ").push_bind(patient_id);
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ").push_bind(owner_id);
        }
        query
            .push(" ORDER BY is_pinned DESC, updated_at DESC LIMIT ")
            .push_bind(page_limit(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        Ok(query.build_query_as::<Note>().fetch_all(self.pool()).await?)
    }

    pub async fn get_note(&self, id: i64) -> Result<Option<Note>, AppError> {
        Ok(sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?)
    }

    async fn check_note_refs(&self, input: &NoteInput) -> Result<(), AppError> {
        if let Some(patient_id) = input.patient_id {
            self.ensure_patient_exists(patient_id).await?;
        }
        if let Some(owner_id) = input.owner_id {
            if self.get_owner(owner_id).await?.is_none() {
                return Err(AppError::ValidationError(format!(
                    "Besitzer {} existiert nicht",
                    owner_id
                )));
            }
        }
        Ok(())
    }

    pub async fn create_note(&self, input: &NoteInput, created_by: Option<i64>) -> Result<Note, AppError> {
        let title = required(&input.title, "title")?;
        self.check_note_refs(input).await?;
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO notes (patient_id, owner_id, title, content, is_pinned, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.patient_id)
        .bind(input.owner_id)
        .bind(&title)
        .bind(input.content.trim())
        .bind(input.is_pinned)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_note(id)
            .await?
            .ok_or_else(|| AppError::not_found("Notiz", id))
    }

    pub async fn update_note(&self, id: i64, input: &NoteInput) -> Result<Note, AppError> {
        let title = required(&input.title, "title")?;
        self.check_note_refs(input).await?;

        let result = sqlx::query(
            r#"
            UPDATE notes SET patient_id = ?, owner_id = ?, title = ?, content = ?, is_pinned = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.patient_id)
        .bind(input.owner_id)
        .bind(&title)
        .bind(input.content.trim())
        .bind(input.is_pinned)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Notiz", id));
        }
        self.get_note(id)
            .await?
            .ok_or_else(|| AppError::not_found("Notiz", id))
    }

    pub async fn delete_note(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Notiz", id));
        }
        Ok(())
    }
}
