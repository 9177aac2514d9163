use serde::{Deserialize, Serialize};
use std::env;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Expose raw internal error messages to clients.
    pub debug: bool,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub backup: BackupConfig,
    pub cron: CronConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub lifetime_minutes: i64,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    pub login_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub directory: String,
    pub keep: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
    pub enabled: bool,
    pub tick_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://tierphysio.db".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            debug: false,
            session: SessionConfig {
                cookie_name: "tierphysio_session".to_string(),
                lifetime_minutes: 480,
                secure_cookie: false,
            },
            auth: AuthConfig {
                bcrypt_cost: bcrypt::DEFAULT_COST,
                login_path: "/login".to_string(),
            },
            backup: BackupConfig {
                directory: "backups".to_string(),
                keep: 10,
            },
            cron: CronConfig {
                enabled: true,
                tick_secs: 60,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `tierphysio.toml` and the environment.
    ///
    /// Environment variables use the `TIERPHYSIO__` prefix with `__` between
    /// nested keys (`TIERPHYSIO__SESSION__LIFETIME_MINUTES=60`). `DATABASE_URL`
    /// overrides the database location directly.
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("tierphysio")
    }

    pub fn load_from(file_stem: &str) -> Result<Self, AppError> {
        let defaults = AppConfig::default();

        let mut builder = config::Config::builder()
            .set_default("database_url", defaults.database_url)
            .and_then(|b| b.set_default("server_host", defaults.server_host))
            .and_then(|b| b.set_default("server_port", defaults.server_port as i64))
            .and_then(|b| b.set_default("debug", defaults.debug))
            .and_then(|b| b.set_default("session.cookie_name", defaults.session.cookie_name))
            .and_then(|b| b.set_default("session.lifetime_minutes", defaults.session.lifetime_minutes))
            .and_then(|b| b.set_default("session.secure_cookie", defaults.session.secure_cookie))
            .and_then(|b| b.set_default("auth.bcrypt_cost", defaults.auth.bcrypt_cost as i64))
            .and_then(|b| b.set_default("auth.login_path", defaults.auth.login_path))
            .and_then(|b| b.set_default("backup.directory", defaults.backup.directory))
            .and_then(|b| b.set_default("backup.keep", defaults.backup.keep as i64))
            .and_then(|b| b.set_default("cron.enabled", defaults.cron.enabled))
            .and_then(|b| b.set_default("cron.tick_secs", defaults.cron.tick_secs as i64))
            .map_err(|e| AppError::ConfigError(format!("Invalid default: {}", e)))?
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(
                config::Environment::with_prefix("TIERPHYSIO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder
                .set_override("database_url", database_url)
                .map_err(|e| AppError::ConfigError(format!("Invalid DATABASE_URL: {}", e)))?;
        }

        let config: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::ConfigError(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::ConfigError("database_url must not be empty".to_string()));
        }

        if self.session.lifetime_minutes <= 0 {
            return Err(AppError::ConfigError(format!(
                "session.lifetime_minutes ({}) must be positive",
                self.session.lifetime_minutes
            )));
        }

        if self.session.cookie_name.is_empty()
            || !self
                .session
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::ConfigError(format!(
                "session.cookie_name ({:?}) is not a valid cookie name",
                self.session.cookie_name
            )));
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(AppError::ConfigError(format!(
                "auth.bcrypt_cost ({}) must be between 4 and 31",
                self.auth.bcrypt_cost
            )));
        }

        if self.backup.keep == 0 {
            return Err(AppError::ConfigError("backup.keep must be at least 1".to_string()));
        }

        if self.cron.tick_secs == 0 {
            return Err(AppError::ConfigError("cron.tick_secs must be at least 1".to_string()));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.auth.bcrypt_cost = 2;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.lifetime_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.cookie_name = "bad cookie;".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backup.keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("settings");
        std::fs::write(
            dir.path().join("settings.toml"),
            "server_port = 8080\n[session]\nlifetime_minutes = 30\n",
        )
        .unwrap();

        let config = AppConfig::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.session.lifetime_minutes, 30);
        assert_eq!(config.session.cookie_name, "tierphysio_session");
    }
}
