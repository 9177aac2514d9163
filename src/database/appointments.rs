use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use super::models::Appointment;
use super::{clean, page_limit, required, Database};
use crate::error::AppError;

const DEFAULT_DURATION_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            _ => Err(AppError::ValidationError(format!(
                "Ungültiger Terminstatus: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentInput {
    pub patient_id: i64,
    pub title: String,
    pub starts_at: NaiveDateTime,
    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,
    /// Used when `ends_at` is absent.
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AppointmentInput {
    fn resolved_end(&self) -> Result<NaiveDateTime, AppError> {
        let end = match (self.ends_at, self.duration_minutes) {
            (Some(end), _) => end,
            (None, Some(minutes)) if minutes > 0 => self.starts_at + Duration::minutes(minutes),
            (None, Some(minutes)) => {
                return Err(AppError::ValidationError(format!(
                    "Dauer muss positiv sein, erhalten: {} Minuten",
                    minutes
                )))
            }
            (None, None) => self.starts_at + Duration::minutes(DEFAULT_DURATION_MINUTES),
        };

        if end <= self.starts_at {
            return Err(AppError::ValidationError(
                "Termin muss nach dem Beginn enden".to_string(),
            ));
        }
        Ok(end)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub patient_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub(crate) fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

impl Database {
    pub async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM appointments WHERE 1 = 1");

        if let Some(from) = filter.from {
            query.push(" AND starts_at >= ").push_bind(day_start(from));
        }
        if let Some(to) = filter.to {
            query
                .push(" AND starts_at < ")
                .push_bind(day_start(to + Duration::days(1)));
        }
        if let Some(patient_id) = filter.patient_id {
            query.push(" AND patient_id = ").push_bind(patient_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }

        query
            .push(" ORDER BY starts_at LIMIT ")
            .push_bind(page_limit(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        Ok(query
            .build_query_as::<Appointment>()
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, AppError> {
        Ok(
            sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?,
        )
    }

    pub(crate) async fn ensure_patient_exists(&self, patient_id: i64) -> Result<(), AppError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM patients WHERE id = ?")
            .bind(patient_id)
            .fetch_optional(self.pool())
            .await?;

        if exists.is_none() {
            return Err(AppError::ValidationError(format!(
                "Patient {} existiert nicht",
                patient_id
            )));
        }
        Ok(())
    }

    pub async fn create_appointment(&self, input: &AppointmentInput) -> Result<Appointment, AppError> {
        let title = required(&input.title, "title")?;
        let ends_at = input.resolved_end()?;
        self.ensure_patient_exists(input.patient_id).await?;
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO appointments (patient_id, title, starts_at, ends_at, status, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.patient_id)
        .bind(&title)
        .bind(input.starts_at)
        .bind(ends_at)
        .bind(input.status.unwrap_or(AppointmentStatus::Scheduled).as_str())
        .bind(clean(&input.notes))
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_appointment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Termin", id))
    }

    pub async fn update_appointment(
        &self,
        id: i64,
        input: &AppointmentInput,
    ) -> Result<Appointment, AppError> {
        let title = required(&input.title, "title")?;
        let ends_at = input.resolved_end()?;
        self.ensure_patient_exists(input.patient_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE appointments SET patient_id = ?, title = ?, starts_at = ?, ends_at = ?,
                status = COALESCE(?, status), notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.patient_id)
        .bind(&title)
        .bind(input.starts_at)
        .bind(ends_at)
        .bind(input.status.map(|s| s.as_str()))
        .bind(clean(&input.notes))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Termin", id));
        }

        self.get_appointment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Termin", id))
    }

    pub async fn set_appointment_status(
        &self,
        id: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppError> {
        let result = sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Termin", id));
        }

        self.get_appointment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Termin", id))
    }

    pub async fn delete_appointment(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Termin", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fixtures;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn input(patient_id: i64, starts_at: NaiveDateTime) -> AppointmentInput {
        AppointmentInput {
            patient_id,
            title: "Hydrotherapie".to_string(),
            starts_at,
            ends_at: None,
            duration_minutes: None,
            status: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_appointment_defaults_and_range_filter() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;
        let patient = fixtures::patient(&db, owner.id, "Luna").await;

        let first = db.create_appointment(&input(patient.id, at(2, 9))).await.unwrap();
        assert_eq!(first.ends_at, at(2, 10));
        assert_eq!(first.status, "scheduled");
        db.create_appointment(&input(patient.id, at(5, 14))).await.unwrap();

        let filter = AppointmentFilter {
            from: NaiveDate::from_ymd_opt(2026, 3, 1),
            to: NaiveDate::from_ymd_opt(2026, 3, 2),
            ..Default::default()
        };
        let found = db.list_appointments(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, first.id);

        let done = db
            .set_appointment_status(first.id, AppointmentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, "completed");
    }

    #[tokio::test]
    async fn test_appointment_must_end_after_start() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;
        let patient = fixtures::patient(&db, owner.id, "Luna").await;

        let mut bad = input(patient.id, at(2, 9));
        bad.ends_at = Some(at(2, 8));
        assert!(matches!(
            db.create_appointment(&bad).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_patient_with_appointments_cannot_be_deleted() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;
        let patient = fixtures::patient(&db, owner.id, "Luna").await;
        let appointment = db.create_appointment(&input(patient.id, at(2, 9))).await.unwrap();

        assert!(matches!(
            db.delete_patient(patient.id).await,
            Err(AppError::Conflict(_))
        ));

        db.delete_appointment(appointment.id).await.unwrap();
        db.delete_patient(patient.id).await.unwrap();
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "no_show".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::NoShow
        );
        assert!("done".parse::<AppointmentStatus>().is_err());
    }
}
