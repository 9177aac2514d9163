use std::sync::Arc;

use crate::auth::{Authenticator, SessionStore};
use crate::backup::BackupManager;
use crate::config::AppConfig;
use crate::cron::CronRunner;
use crate::database::Database;

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Database,
    pub auth: Authenticator,
    pub backups: BackupManager,
    pub cron: CronRunner,
}

impl AppState {
    pub fn new(config: AppConfig, database: Database, sessions: Arc<dyn SessionStore>) -> Self {
        let auth = Authenticator::new(database.clone(), sessions.clone(), &config);
        let backups = BackupManager::new(database.clone(), &config.backup);
        let cron = CronRunner::new(database.clone(), backups.clone(), sessions);
        Self {
            config: Arc::new(config),
            database,
            auth,
            backups,
            cron,
        }
    }
}
