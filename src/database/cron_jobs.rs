use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::models::{CronJob, CronLog};
use super::{page_limit, required, Database};
use crate::error::AppError;

/// Maintenance tasks the scheduler knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CronJobType {
    Backup,
    MarkOverdueInvoices,
    PurgeSessions,
    PruneActivityLog,
}

impl CronJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CronJobType::Backup => "backup",
            CronJobType::MarkOverdueInvoices => "mark_overdue_invoices",
            CronJobType::PurgeSessions => "purge_sessions",
            CronJobType::PruneActivityLog => "prune_activity_log",
        }
    }
}

impl fmt::Display for CronJobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CronJobType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backup" => Ok(CronJobType::Backup),
            "mark_overdue_invoices" => Ok(CronJobType::MarkOverdueInvoices),
            "purge_sessions" => Ok(CronJobType::PurgeSessions),
            "prune_activity_log" => Ok(CronJobType::PruneActivityLog),
            other => Err(AppError::ValidationError(format!(
                "Unbekannter Job-Typ: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJobInput {
    pub name: String,
    pub job_type: String,
    pub interval_minutes: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Ten years.
pub const MAX_INTERVAL_MINUTES: i64 = 525_600 * 10;

impl CronJobInput {
    fn validate(&self) -> Result<(String, CronJobType), AppError> {
        let name = required(&self.name, "name")?;
        let job_type = self.job_type.parse::<CronJobType>()?;
        if !(1..=MAX_INTERVAL_MINUTES).contains(&self.interval_minutes) {
            return Err(AppError::ValidationError(format!(
                "interval_minutes muss zwischen 1 und {} liegen",
                MAX_INTERVAL_MINUTES
            )));
        }
        Ok((name, job_type))
    }
}

/// Outcome of one job execution, written to `cron_logs`.
#[derive(Debug, Clone)]
pub struct CronRun {
    pub job_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub message: String,
}

impl Database {
    pub async fn list_cron_jobs(&self) -> Result<Vec<CronJob>, AppError> {
        Ok(sqlx::query_as::<_, CronJob>("SELECT * FROM cron_jobs ORDER BY name")
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn get_cron_job(&self, id: i64) -> Result<Option<CronJob>, AppError> {
        Ok(sqlx::query_as::<_, CronJob>("SELECT * FROM cron_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?)
    }

    /// Active jobs that have never run or whose next run is due.
    pub async fn due_cron_jobs(&self, now: DateTime<Utc>) -> Result<Vec<CronJob>, AppError> {
        Ok(sqlx::query_as::<_, CronJob>(
            "SELECT * FROM cron_jobs WHERE is_active = 1 AND (next_run_at IS NULL OR next_run_at <= ?) ORDER BY id",
        )
        .bind(now)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn create_cron_job(&self, input: &CronJobInput) -> Result<CronJob, AppError> {
        let (name, job_type) = input.validate()?;
        let id = sqlx::query(
            "INSERT INTO cron_jobs (name, job_type, interval_minutes, is_active, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(job_type.as_str())
        .bind(input.interval_minutes)
        .bind(input.is_active)
        .bind(Utc::now())
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_cron_job(id)
            .await?
            .ok_or_else(|| AppError::not_found("Cron-Job", id))
    }

    /// Update a job. The schedule restarts so the new interval applies at once.
    pub async fn update_cron_job(&self, id: i64, input: &CronJobInput) -> Result<CronJob, AppError> {
        let (name, job_type) = input.validate()?;
        let result = sqlx::query(
            "UPDATE cron_jobs SET name = ?, job_type = ?, interval_minutes = ?, is_active = ?, next_run_at = NULL WHERE id = ?",
        )
        .bind(&name)
        .bind(job_type.as_str())
        .bind(input.interval_minutes)
        .bind(input.is_active)
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Cron-Job", id));
        }
        self.get_cron_job(id)
            .await?
            .ok_or_else(|| AppError::not_found("Cron-Job", id))
    }

    pub async fn toggle_cron_job(&self, id: i64) -> Result<CronJob, AppError> {
        let result = sqlx::query("UPDATE cron_jobs SET is_active = NOT is_active WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Cron-Job", id));
        }
        self.get_cron_job(id)
            .await?
            .ok_or_else(|| AppError::not_found("Cron-Job", id))
    }

    pub async fn delete_cron_job(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM cron_jobs WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Cron-Job", id));
        }
        Ok(())
    }

    /// Log a run and schedule the next one, atomically.
    pub async fn record_cron_run(&self, run: &CronRun, interval_minutes: i64) -> Result<CronLog, AppError> {
        let status = if run.success { "success" } else { "failed" };
        let next_run = Duration::try_minutes(interval_minutes.clamp(1, MAX_INTERVAL_MINUTES))
            .and_then(|interval| run.finished_at.checked_add_signed(interval))
            .ok_or_else(|| {
                AppError::Internal(format!("Next run of cron job {} is out of range", run.job_id))
            })?;

        let mut tx = self.pool().begin().await?;
        let log_id = sqlx::query(
            "INSERT INTO cron_logs (job_id, started_at, finished_at, status, message) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(run.job_id)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(status)
        .bind(&run.message)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("UPDATE cron_jobs SET last_run_at = ?, next_run_at = ? WHERE id = ?")
            .bind(run.started_at)
            .bind(next_run)
            .bind(run.job_id)
            .execute(&mut *tx)
            .await?;

        let log = sqlx::query_as::<_, CronLog>("SELECT * FROM cron_logs WHERE id = ?")
            .bind(log_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(log)
    }

    pub async fn list_cron_logs(&self, job_id: Option<i64>, limit: Option<i64>) -> Result<Vec<CronLog>, AppError> {
        Ok(sqlx::query_as::<_, CronLog>(
            "SELECT * FROM cron_logs WHERE (?1 IS NULL OR job_id = ?1) ORDER BY started_at DESC, id DESC LIMIT ?2",
        )
        .bind(job_id)
        .bind(page_limit(limit))
        .fetch_all(self.pool())
        .await?)
    }
}
