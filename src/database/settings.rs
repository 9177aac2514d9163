use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::models::Setting;
use super::Database;
use crate::error::AppError;

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 64
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
}

pub const INVOICE_DESIGN_KEY: &str = "invoice_design";
pub const INVOICE_DUE_DAYS_KEY: &str = "invoice_due_days";
pub const DEFAULT_TAX_RATE_KEY: &str = "default_tax_rate";
pub const ACTIVITY_RETENTION_KEY: &str = "activity_log_retention_days";

pub const MAX_INVOICE_DUE_DAYS: i64 = 365;
pub const MAX_ACTIVITY_RETENTION_DAYS: i64 = 3650;

fn integer_in(key: &str, value: &str, min: i64, max: i64) -> Result<(), AppError> {
    match value.trim().parse::<i64>() {
        Ok(n) if (min..=max).contains(&n) => Ok(()),
        _ => Err(AppError::ValidationError(format!(
            "{} muss eine ganze Zahl zwischen {} und {} sein",
            key, min, max
        ))),
    }
}

/// Range checks for settings the application reads back as numbers.
pub fn validate_setting(key: &str, value: &str) -> Result<(), AppError> {
    match key {
        INVOICE_DUE_DAYS_KEY => integer_in(key, value, 0, MAX_INVOICE_DUE_DAYS),
        ACTIVITY_RETENTION_KEY => integer_in(key, value, 1, MAX_ACTIVITY_RETENTION_DAYS),
        DEFAULT_TAX_RATE_KEY => match value.trim().parse::<f64>() {
            Ok(rate) if (0.0..=100.0).contains(&rate) => Ok(()),
            _ => Err(AppError::ValidationError(format!(
                "{} muss zwischen 0 und 100 liegen",
                key
            ))),
        },
        INVOICE_DESIGN_KEY => {
            let design: InvoiceDesign = serde_json::from_str(value)?;
            design.validate()
        }
        _ => Ok(()),
    }
}

/// Layout options for printed invoices, stored as JSON under `invoice_design`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceDesign {
    pub primary_color: String,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub footer_text: String,
    #[serde(default = "default_true")]
    pub show_tax_breakdown: bool,
}

fn default_true() -> bool {
    true
}

impl Default for InvoiceDesign {
    fn default() -> Self {
        Self {
            primary_color: "#2f6f4f".to_string(),
            logo_path: None,
            footer_text: String::new(),
            show_tax_breakdown: true,
        }
    }
}

impl InvoiceDesign {
    pub fn validate(&self) -> Result<(), AppError> {
        let color = self.primary_color.as_bytes();
        if color.len() != 7 || color[0] != b'#' || !color[1..].iter().all(u8::is_ascii_hexdigit) {
            return Err(AppError::ValidationError(format!(
                "primary_color muss die Form #rrggbb haben, erhalten: {:?}",
                self.primary_color
            )));
        }
        if self.footer_text.len() > 2000 {
            return Err(AppError::ValidationError(
                "footer_text ist zu lang".to_string(),
            ));
        }
        Ok(())
    }
}

impl Database {
    pub async fn list_settings(&self) -> Result<Vec<Setting>, AppError> {
        Ok(sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY key")
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut values = BTreeMap::new();
        values.insert(key.to_string(), value.to_string());
        self.update_settings(&values).await
    }

    /// Upsert several settings in one transaction.
    pub async fn update_settings(&self, values: &BTreeMap<String, String>) -> Result<(), AppError> {
        if let Some(bad) = values.keys().find(|k| !valid_key(k)) {
            return Err(AppError::ValidationError(format!(
                "Ungültiger Einstellungsschlüssel: {:?}",
                bad
            )));
        }
        for (key, value) in values {
            validate_setting(key, value)?;
        }

        let now = Utc::now();
        let mut tx = self.pool().begin().await?;
        for (key, value) in values {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn invoice_design(&self) -> Result<InvoiceDesign, AppError> {
        match self.get_setting(INVOICE_DESIGN_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw).unwrap_or_default()),
            None => Ok(InvoiceDesign::default()),
        }
    }

    pub async fn save_invoice_design(&self, design: &InvoiceDesign) -> Result<InvoiceDesign, AppError> {
        design.validate()?;
        self.set_setting(INVOICE_DESIGN_KEY, &serde_json::to_string(design)?)
            .await?;
        Ok(design.clone())
    }
}
