use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use super::models::{Patient, PatientSummary};
use super::{clean, page_limit, required, Database};
use crate::error::AppError;

const SUMMARY_SELECT: &str = r#"
    SELECT p.*, o.first_name || ' ' || o.last_name AS owner_name
    FROM patients p
    JOIN owners o ON o.id = p.owner_id
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientInput {
    pub owner_id: i64,
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub microchip: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl PatientInput {
    pub fn normalized(&self) -> Result<PatientInput, AppError> {
        if let Some(weight) = self.weight_kg {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(AppError::ValidationError(format!(
                    "Gewicht muss eine positive Zahl sein, erhalten: {}",
                    weight
                )));
            }
        }

        if let Some(birth_date) = self.birth_date {
            if birth_date > Utc::now().date_naive() {
                return Err(AppError::ValidationError(
                    "Geburtsdatum liegt in der Zukunft".to_string(),
                ));
            }
        }

        Ok(PatientInput {
            owner_id: self.owner_id,
            name: required(&self.name, "name")?,
            species: required(&self.species, "species")?,
            breed: clean(&self.breed),
            birth_date: self.birth_date,
            gender: clean(&self.gender),
            weight_kg: self.weight_kg,
            microchip: clean(&self.microchip),
            notes: clean(&self.notes),
            is_active: Some(self.is_active.unwrap_or(true)),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientFilter {
    pub q: Option<String>,
    pub owner_id: Option<i64>,
    pub active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Database {
    pub async fn list_patients(&self, filter: &PatientFilter) -> Result<Vec<PatientSummary>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(SUMMARY_SELECT);
        query.push(" WHERE 1 = 1");

        if let Some(term) = filter.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term);
            query
                .push(" AND (p.name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.breed LIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.microchip LIKE ")
                .push_bind(pattern.clone())
                .push(" OR o.last_name LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(owner_id) = filter.owner_id {
            query.push(" AND p.owner_id = ").push_bind(owner_id);
        }

        if let Some(active) = filter.active {
            query.push(" AND p.is_active = ").push_bind(active);
        }

        query
            .push(" ORDER BY p.name LIMIT ")
            .push_bind(page_limit(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        Ok(query
            .build_query_as::<PatientSummary>()
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn get_patient(&self, id: i64) -> Result<Option<PatientSummary>, AppError> {
        Ok(
            sqlx::query_as::<_, PatientSummary>(&format!("{} WHERE p.id = ?", SUMMARY_SELECT))
                .bind(id)
                .fetch_optional(self.pool())
                .await?,
        )
    }

    async fn ensure_owner_exists(&self, owner_id: i64) -> Result<(), AppError> {
        if self.get_owner(owner_id).await?.is_none() {
            return Err(AppError::ValidationError(format!(
                "Besitzer {} existiert nicht",
                owner_id
            )));
        }
        Ok(())
    }

    pub async fn create_patient(&self, input: &PatientInput) -> Result<Patient, AppError> {
        let input = input.normalized()?;
        self.ensure_owner_exists(input.owner_id).await?;
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO patients (owner_id, name, species, breed, birth_date, gender, weight_kg,
                                  microchip, notes, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.owner_id)
        .bind(&input.name)
        .bind(&input.species)
        .bind(&input.breed)
        .bind(input.birth_date)
        .bind(&input.gender)
        .bind(input.weight_kg)
        .bind(&input.microchip)
        .bind(&input.notes)
        .bind(input.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.find_patient_row(id).await
    }

    pub async fn update_patient(&self, id: i64, input: &PatientInput) -> Result<Patient, AppError> {
        let input = input.normalized()?;
        self.ensure_owner_exists(input.owner_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE patients SET owner_id = ?, name = ?, species = ?, breed = ?, birth_date = ?,
                gender = ?, weight_kg = ?, microchip = ?, notes = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.owner_id)
        .bind(&input.name)
        .bind(&input.species)
        .bind(&input.breed)
        .bind(input.birth_date)
        .bind(&input.gender)
        .bind(input.weight_kg)
        .bind(&input.microchip)
        .bind(&input.notes)
        .bind(input.is_active.unwrap_or(true))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Patient", id));
        }
        self.find_patient_row(id).await
    }

    async fn find_patient_row(&self, id: i64) -> Result<Patient, AppError> {
        sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Patient", id))
    }

    /// Delete a patient that has no appointments or treatments left.
    pub async fn delete_patient(&self, id: i64) -> Result<(), AppError> {
        let (appointments, treatments): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM appointments WHERE patient_id = ?1),
                (SELECT COUNT(*) FROM treatments WHERE patient_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        if appointments > 0 || treatments > 0 {
            return Err(AppError::Conflict(format!(
                "Patient {} hat noch {} Termin(e) und {} Behandlung(en)",
                id, appointments, treatments
            )));
        }

        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Patient", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fixtures;

    #[tokio::test]
    async fn test_patient_requires_existing_owner() {
        let db = Database::new_in_memory().await.unwrap();
        let input = PatientInput {
            owner_id: 999,
            name: "Bello".to_string(),
            species: "Hund".to_string(),
            breed: None,
            birth_date: None,
            gender: None,
            weight_kg: None,
            microchip: None,
            notes: None,
            is_active: None,
        };

        assert!(matches!(
            db.create_patient(&input).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_list_patients_with_owner_name() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;
        fixtures::patient(&db, owner.id, "Luna").await;
        fixtures::patient(&db, owner.id, "Max").await;

        let all = db.list_patients(&PatientFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].owner_name, "Test Krause");

        let filtered = db
            .list_patients(&PatientFilter {
                q: Some("lun".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].patient.name, "Luna");
    }

    #[tokio::test]
    async fn test_owner_delete_cascades_to_patients() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;
        let patient = fixtures::patient(&db, owner.id, "Luna").await;

        db.delete_owner(owner.id).await.unwrap();
        assert!(db.get_patient(patient.id).await.unwrap().is_none());
    }
}
