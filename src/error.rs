use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use tracing::error;

/// Message shown to clients in place of internal failures unless debug mode is on.
pub const GENERIC_ERROR_MESSAGE: &str = "Ein interner Fehler ist aufgetreten.";

static EXPOSE_INTERNAL_ERRORS: AtomicBool = AtomicBool::new(false);

/// Toggle whether raw internal error messages reach the client.
pub fn set_expose_internal_errors(enabled: bool) {
    EXPOSE_INTERNAL_ERRORS.store(enabled, Ordering::Relaxed);
}

pub fn expose_internal_errors() -> bool {
    EXPOSE_INTERNAL_ERRORS.load(Ordering::Relaxed)
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::ValidationError(format!("Ungültiges JSON: {}", err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("Datensatz nicht gefunden".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict("Ein Datensatz mit diesen Werten existiert bereits".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => Self::Conflict(
                "Der Datensatz ist mit anderen Datensätzen verknüpft".to_string(),
            ),
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Internal(format!("Password hashing failed: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Konfigurationsfehler: {0}")]
    ConfigError(String),

    #[error("Datenbankfehler: {0}")]
    DatabaseError(String),

    #[error("Ungültige Eingabe: {0}")]
    ValidationError(String),

    #[error("Nicht gefunden: {0}")]
    NotFound(String),

    #[error("Konflikt: {0}")]
    Conflict(String),

    #[error("Benutzername oder Passwort ist falsch")]
    InvalidCredentials,

    #[error("Anmeldung erforderlich")]
    Unauthorized,

    #[error("Keine Berechtigung: {0}")]
    Forbidden(String),

    #[error("CSRF-Token fehlt oder ist ungültig")]
    CsrfMismatch,

    #[error("Unbekannte Aktion: {0}")]
    UnknownAction(String),

    #[error("Sicherungsfehler: {0}")]
    BackupError(String),

    #[error("E/A-Fehler: {0}")]
    IoError(String),

    #[error("Interner Fehler: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn missing_field(field: &str) -> Self {
        Self::ValidationError(format!("Feld '{}' ist erforderlich", field))
    }

    pub fn not_found(entity: &str, id: i64) -> Self {
        Self::NotFound(format!("{} {} nicht gefunden", entity, id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::UnknownAction(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::CsrfMismatch => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ConfigError(_)
            | AppError::DatabaseError(_)
            | AppError::BackupError(_)
            | AppError::IoError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Message safe to hand to the client.
    pub fn public_message(&self) -> String {
        if self.is_internal() && !expose_internal_errors() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_internal() {
            error!("Request failed: {}", self);
        }

        let body = serde_json::json!({
            "status": "error",
            "message": self.public_message(),
        });

        (status, Json(body)).into_response()
    }
}
