//! Background maintenance jobs driven by the `cron_jobs` table.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::auth::SessionStore;
use crate::backup::BackupManager;
use crate::database::cron_jobs::{CronJobType, CronRun};
use crate::database::models::{CronJob, CronLog};
use crate::database::Database;
use crate::error::AppError;

const DEFAULT_ACTIVITY_RETENTION_DAYS: i64 = 365;

#[derive(Clone)]
pub struct CronRunner {
    database: Database,
    backups: BackupManager,
    sessions: Arc<dyn SessionStore>,
}

impl CronRunner {
    pub fn new(database: Database, backups: BackupManager, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            database,
            backups,
            sessions,
        }
    }

    /// Run every active job that is due at `now`.
    ///
    /// A job whose run cannot be recorded is logged and skipped so the
    /// remaining jobs still run.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<Vec<CronLog>, AppError> {
        let jobs = self.database.due_cron_jobs(now).await?;
        let mut logs = Vec::with_capacity(jobs.len());
        for job in &jobs {
            match self.run_job(job).await {
                Ok(log) => logs.push(log),
                Err(e) => error!("Could not record run of cron job '{}': {}", job.name, e),
            }
        }
        Ok(logs)
    }

    /// Run one job immediately and record the outcome.
    ///
    /// Job failures are logged to `cron_logs`, not returned as errors.
    pub async fn run_job(&self, job: &CronJob) -> Result<CronLog, AppError> {
        let started_at = Utc::now();
        let outcome = match job.job_type.parse::<CronJobType>() {
            Ok(job_type) => self.execute(job_type, started_at).await,
            Err(e) => Err(e),
        };
        let finished_at = Utc::now();

        let (success, message) = match outcome {
            Ok(message) => {
                info!("Cron job '{}' finished: {}", job.name, message);
                (true, message)
            }
            Err(e) => {
                error!("Cron job '{}' failed: {}", job.name, e);
                (false, e.to_string())
            }
        };

        self.database
            .record_cron_run(
                &CronRun {
                    job_id: job.id,
                    started_at,
                    finished_at,
                    success,
                    message,
                },
                job.interval_minutes,
            )
            .await
    }

    async fn execute(&self, job_type: CronJobType, now: DateTime<Utc>) -> Result<String, AppError> {
        match job_type {
            CronJobType::Backup => {
                let record = self.backups.create(None).await?;
                Ok(format!("Created {}", record.filename))
            }
            CronJobType::MarkOverdueInvoices => {
                let count = self.database.mark_overdue_invoices(now.date_naive()).await?;
                Ok(format!("{} invoice(s) marked overdue", count))
            }
            CronJobType::PurgeSessions => {
                let count = self.sessions.purge_expired(now).await?;
                Ok(format!("{} expired session(s) removed", count))
            }
            CronJobType::PruneActivityLog => {
                let days = self
                    .database
                    .get_setting("activity_log_retention_days")
                    .await?
                    .and_then(|v| v.parse::<i64>().ok())
                    .filter(|d| *d > 0)
                    .unwrap_or(DEFAULT_ACTIVITY_RETENTION_DAYS);
                let count = self.database.prune_activity(now - Duration::days(days)).await?;
                Ok(format!("{} activity entries older than {} days removed", count, days))
            }
        }
    }

    /// Tick forever on the given interval.
    pub fn spawn(self, tick: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                match self.run_due(Utc::now()).await {
                    Ok(logs) if !logs.is_empty() => debug!("Cron tick ran {} job(s)", logs.len()),
                    Ok(_) => {}
                    Err(e) => error!("Cron tick failed: {}", e),
                }
            }
        })
    }
}
