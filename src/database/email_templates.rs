use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::models::EmailTemplate;
use super::{required, Database};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplateInput {
    pub template_key: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl EmailTemplateInput {
    fn normalized(&self) -> Result<EmailTemplateInput, AppError> {
        let template_key = required(&self.template_key, "template_key")?;
        if !template_key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(AppError::ValidationError(format!(
                "Ungültiger Vorlagenschlüssel: {}",
                template_key
            )));
        }
        Ok(EmailTemplateInput {
            template_key,
            name: required(&self.name, "name")?,
            subject: required(&self.subject, "subject")?,
            body: required(&self.body, "body")?,
            is_active: self.is_active,
        })
    }
}

impl Database {
    pub async fn list_email_templates(&self) -> Result<Vec<EmailTemplate>, AppError> {
        Ok(sqlx::query_as::<_, EmailTemplate>("SELECT * FROM email_templates ORDER BY template_key")
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn get_email_template(&self, id: i64) -> Result<Option<EmailTemplate>, AppError> {
        Ok(sqlx::query_as::<_, EmailTemplate>("SELECT * FROM email_templates WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn get_email_template_by_key(&self, key: &str) -> Result<Option<EmailTemplate>, AppError> {
        Ok(sqlx::query_as::<_, EmailTemplate>("SELECT * FROM email_templates WHERE template_key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn create_email_template(&self, input: &EmailTemplateInput) -> Result<EmailTemplate, AppError> {
        let input = input.normalized()?;
        let id = sqlx::query(
            "INSERT INTO email_templates (template_key, name, subject, body, is_active, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.template_key)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.body)
        .bind(input.is_active)
        .bind(Utc::now())
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_email_template(id)
            .await?
            .ok_or_else(|| AppError::not_found("E-Mail-Vorlage", id))
    }

    pub async fn update_email_template(&self, id: i64, input: &EmailTemplateInput) -> Result<EmailTemplate, AppError> {
        let input = input.normalized()?;
        let result = sqlx::query(
            "UPDATE email_templates SET template_key = ?, name = ?, subject = ?, body = ?, is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&input.template_key)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.body)
        .bind(input.is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("E-Mail-Vorlage", id));
        }
        self.get_email_template(id)
            .await?
            .ok_or_else(|| AppError::not_found("E-Mail-Vorlage", id))
    }

    pub async fn delete_email_template(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM email_templates WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("E-Mail-Vorlage", id));
        }
        Ok(())
    }
}
