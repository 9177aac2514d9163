use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::models::Document;
use super::{clean, required, Database};
use crate::error::AppError;

/// Metadata for a file stored by the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub patient_id: i64,
    pub title: String,
    pub file_path: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
}

impl Database {
    pub async fn list_documents(&self, patient_id: i64) -> Result<Vec<Document>, AppError> {
        Ok(sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE patient_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(patient_id)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn get_document(&self, id: i64) -> Result<Option<Document>, AppError> {
        Ok(sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn create_document(
        &self,
        input: &DocumentInput,
        uploaded_by: Option<i64>,
    ) -> Result<Document, AppError> {
        let title = required(&input.title, "title")?;
        let file_path = required(&input.file_path, "file_path")?;
        if file_path.split(['/', '\\']).any(|part| part == "..") {
            return Err(AppError::ValidationError(
                "file_path darf keine '..'-Segmente enthalten".to_string(),
            ));
        }
        if matches!(input.size_bytes, Some(size) if size < 0) {
            return Err(AppError::ValidationError(
                "size_bytes darf nicht negativ sein".to_string(),
            ));
        }
        self.ensure_patient_exists(input.patient_id).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO documents (patient_id, title, file_path, mime_type, size_bytes, uploaded_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.patient_id)
        .bind(&title)
        .bind(&file_path)
        .bind(clean(&input.mime_type))
        .bind(input.size_bytes)
        .bind(uploaded_by)
        .bind(Utc::now())
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_document(id)
            .await?
            .ok_or_else(|| AppError::not_found("Dokument", id))
    }

    pub async fn delete_document(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Dokument", id));
        }
        Ok(())
    }
}
