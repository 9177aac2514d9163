use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::models::Treatment;
use super::{clean, required, Database};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentInput {
    pub patient_id: i64,
    #[serde(default)]
    pub appointment_id: Option<i64>,
    pub treatment_date: NaiveDate,
    pub therapy_type: String,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub findings: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i64>,
}

impl TreatmentInput {
    fn validate(&self) -> Result<String, AppError> {
        if matches!(self.duration_minutes, Some(m) if m <= 0) {
            return Err(AppError::ValidationError(
                "Dauer muss positiv sein".to_string(),
            ));
        }
        if matches!(self.price_cents, Some(p) if p < 0) {
            return Err(AppError::ValidationError(
                "Preis darf nicht negativ sein".to_string(),
            ));
        }
        required(&self.therapy_type, "therapy_type")
    }
}

impl Database {
    pub async fn list_treatments(&self, patient_id: Option<i64>) -> Result<Vec<Treatment>, AppError> {
        let rows = match patient_id {
            Some(patient_id) => {
                sqlx::query_as::<_, Treatment>(
                    "SELECT * FROM treatments WHERE patient_id = ? ORDER BY treatment_date DESC, id DESC",
                )
                .bind(patient_id)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, Treatment>(
                    "SELECT * FROM treatments ORDER BY treatment_date DESC, id DESC LIMIT 200",
                )
                .fetch_all(self.pool())
                .await?
            }
        };
        Ok(rows)
    }

    pub async fn get_treatment(&self, id: i64) -> Result<Option<Treatment>, AppError> {
        Ok(
            sqlx::query_as::<_, Treatment>("SELECT * FROM treatments WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?,
        )
    }

    async fn ensure_appointment_belongs(
        &self,
        appointment_id: Option<i64>,
        patient_id: i64,
    ) -> Result<(), AppError> {
        let Some(appointment_id) = appointment_id else {
            return Ok(());
        };

        match self.get_appointment(appointment_id).await? {
            Some(appointment) if appointment.patient_id == patient_id => Ok(()),
            Some(_) => Err(AppError::ValidationError(format!(
                "Termin {} gehört zu einem anderen Patienten",
                appointment_id
            ))),
            None => Err(AppError::ValidationError(format!(
                "Termin {} existiert nicht",
                appointment_id
            ))),
        }
    }

    pub async fn create_treatment(&self, input: &TreatmentInput) -> Result<Treatment, AppError> {
        let therapy_type = input.validate()?;
        self.ensure_patient_exists(input.patient_id).await?;
        self.ensure_appointment_belongs(input.appointment_id, input.patient_id)
            .await?;
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO treatments (patient_id, appointment_id, treatment_date, therapy_type,
                                    duration_minutes, findings, notes, price_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.patient_id)
        .bind(input.appointment_id)
        .bind(input.treatment_date)
        .bind(&therapy_type)
        .bind(input.duration_minutes)
        .bind(clean(&input.findings))
        .bind(clean(&input.notes))
        .bind(input.price_cents)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_treatment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Behandlung", id))
    }

    pub async fn update_treatment(&self, id: i64, input: &TreatmentInput) -> Result<Treatment, AppError> {
        let therapy_type = input.validate()?;
        self.ensure_patient_exists(input.patient_id).await?;
        self.ensure_appointment_belongs(input.appointment_id, input.patient_id)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE treatments SET patient_id = ?, appointment_id = ?, treatment_date = ?, therapy_type = ?,
                duration_minutes = ?, findings = ?, notes = ?, price_cents = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.patient_id)
        .bind(input.appointment_id)
        .bind(input.treatment_date)
        .bind(&therapy_type)
        .bind(input.duration_minutes)
        .bind(clean(&input.findings))
        .bind(clean(&input.notes))
        .bind(input.price_cents)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Behandlung", id));
        }

        self.get_treatment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Behandlung", id))
    }

    pub async fn delete_treatment(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM treatments WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Behandlung", id));
        }
        Ok(())
    }
}
