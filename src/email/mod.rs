//! Email template rendering and SMTP settings.
//!
//! Messages are rendered and previewed here; delivery is left to the
//! configured mail relay.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::database::models::EmailTemplate;
use crate::database::{valid_email, Database};
use crate::error::AppError;

pub const SMTP_SETTINGS_KEY: &str = "smtp";
pub const PASSWORD_MASK: &str = "********";

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Replace `{{ name }}` markers with values from `vars`.
/// Markers without a value are left as they are.
pub fn render(template: &str, vars: &Map<String, Value>) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => display_value(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder names used in a template, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder().captures_iter(template) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

pub fn render_template(template: &EmailTemplate, vars: &Map<String, Value>) -> RenderedEmail {
    RenderedEmail {
        subject: render(&template.subject, vars),
        body: render(&template.body, vars),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpEncryption {
    None,
    Ssl,
    #[default]
    Tls,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub encryption: SmtpEncryption,
    pub from_address: String,
    #[serde(default)]
    pub from_name: Option<String>,
}

impl SmtpSettings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.host.trim().is_empty() {
            return Err(AppError::missing_field("host"));
        }
        if self.port == 0 {
            return Err(AppError::ValidationError("port darf nicht 0 sein".to_string()));
        }
        if !valid_email(self.from_address.trim()) {
            return Err(AppError::ValidationError(format!(
                "Ungültige Absenderadresse: {}",
                self.from_address
            )));
        }
        Ok(())
    }

    /// Copy safe to return to clients.
    pub fn masked(&self) -> SmtpSettings {
        SmtpSettings {
            password: self.password.as_ref().map(|_| PASSWORD_MASK.to_string()),
            ..self.clone()
        }
    }
}

pub async fn load_smtp_settings(database: &Database) -> Result<Option<SmtpSettings>, AppError> {
    match database.get_setting(SMTP_SETTINGS_KEY).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw).map_err(|e| {
            AppError::Internal(format!("Stored SMTP settings are invalid: {}", e))
        })?)),
        None => Ok(None),
    }
}

/// Validate and store SMTP settings. A missing or masked password keeps
/// the stored one.
pub async fn save_smtp_settings(
    database: &Database,
    mut settings: SmtpSettings,
) -> Result<SmtpSettings, AppError> {
    settings.validate()?;
    settings.host = settings.host.trim().to_string();
    settings.from_address = settings.from_address.trim().to_string();

    let keep_existing = match settings.password.as_deref() {
        None => true,
        Some(p) => p == PASSWORD_MASK,
    };
    if keep_existing {
        settings.password = load_smtp_settings(database)
            .await?
            .and_then(|existing| existing.password);
    }

    database
        .set_setting(SMTP_SETTINGS_KEY, &serde_json::to_string(&settings)?)
        .await?;
    Ok(settings.masked())
}
