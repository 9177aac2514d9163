use chrono::Utc;
use serde_json::Value;

use super::models::Module;
use super::Database;
use crate::error::AppError;

impl Database {
    pub async fn list_modules(&self) -> Result<Vec<Module>, AppError> {
        Ok(sqlx::query_as::<_, Module>("SELECT * FROM modules ORDER BY module_key")
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn get_module(&self, key: &str) -> Result<Option<Module>, AppError> {
        Ok(sqlx::query_as::<_, Module>("SELECT * FROM modules WHERE module_key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn is_module_enabled(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.get_module(key).await?.map(|m| m.is_enabled).unwrap_or(false))
    }

    pub async fn set_module_enabled(&self, key: &str, enabled: bool) -> Result<Module, AppError> {
        let result = sqlx::query("UPDATE modules SET is_enabled = ?, updated_at = ? WHERE module_key = ?")
            .bind(enabled)
            .bind(Utc::now())
            .bind(key)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Modul {} nicht gefunden", key)));
        }
        self.get_module(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Modul {} nicht gefunden", key)))
    }

    /// Replace a module's configuration. Only JSON objects are accepted.
    pub async fn update_module_config(&self, key: &str, config: &Value) -> Result<Module, AppError> {
        if !config.is_object() {
            return Err(AppError::ValidationError(
                "Modulkonfiguration muss ein JSON-Objekt sein".to_string(),
            ));
        }

        let result = sqlx::query("UPDATE modules SET config = ?, updated_at = ? WHERE module_key = ?")
            .bind(config.to_string())
            .bind(Utc::now())
            .bind(key)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Modul {} nicht gefunden", key)));
        }
        self.get_module(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Modul {} nicht gefunden", key)))
    }
}
