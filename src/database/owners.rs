use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use super::models::{Owner, Patient};
use super::{clean, page_limit, required, valid_email, Database};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerInput {
    #[serde(default)]
    pub salutation: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OwnerInput {
    /// Trim fields and check required values.
    pub fn normalized(&self) -> Result<OwnerInput, AppError> {
        let email = clean(&self.email);
        if let Some(email) = &email {
            if !valid_email(email) {
                return Err(AppError::ValidationError(format!(
                    "Ungültige E-Mail-Adresse: {}",
                    email
                )));
            }
        }

        Ok(OwnerInput {
            salutation: clean(&self.salutation),
            first_name: required(&self.first_name, "first_name")?,
            last_name: required(&self.last_name, "last_name")?,
            email,
            phone: clean(&self.phone),
            street: clean(&self.street),
            zip: clean(&self.zip),
            city: clean(&self.city),
            notes: clean(&self.notes),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerDetail {
    #[serde(flatten)]
    pub owner: Owner,
    pub patients: Vec<Patient>,
}

impl Database {
    pub async fn list_owners(
        &self,
        search: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Owner>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM owners");

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term);
            query
                .push(" WHERE (first_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR email LIKE ")
                .push_bind(pattern.clone())
                .push(" OR city LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        query
            .push(" ORDER BY last_name, first_name LIMIT ")
            .push_bind(page_limit(limit))
            .push(" OFFSET ")
            .push_bind(offset.unwrap_or(0).max(0));

        Ok(query.build_query_as::<Owner>().fetch_all(self.pool()).await?)
    }

    pub async fn get_owner(&self, id: i64) -> Result<Option<Owner>, AppError> {
        Ok(sqlx::query_as::<_, Owner>("SELECT * FROM owners WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn get_owner_detail(&self, id: i64) -> Result<Option<OwnerDetail>, AppError> {
        let Some(owner) = self.get_owner(id).await? else {
            return Ok(None);
        };

        let patients = sqlx::query_as::<_, Patient>(
            "SELECT * FROM patients WHERE owner_id = ? ORDER BY name",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;

        Ok(Some(OwnerDetail { owner, patients }))
    }

    pub async fn create_owner(&self, input: &OwnerInput) -> Result<Owner, AppError> {
        let input = input.normalized()?;
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO owners (salutation, first_name, last_name, email, phone, street, zip, city, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.salutation)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.street)
        .bind(&input.zip)
        .bind(&input.city)
        .bind(&input.notes)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_owner(id)
            .await?
            .ok_or_else(|| AppError::not_found("Besitzer", id))
    }

    pub async fn update_owner(&self, id: i64, input: &OwnerInput) -> Result<Owner, AppError> {
        let input = input.normalized()?;

        let result = sqlx::query(
            r#"
            UPDATE owners SET salutation = ?, first_name = ?, last_name = ?, email = ?, phone = ?,
                street = ?, zip = ?, city = ?, notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.salutation)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.street)
        .bind(&input.zip)
        .bind(&input.city)
        .bind(&input.notes)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Besitzer", id));
        }

        self.get_owner(id)
            .await?
            .ok_or_else(|| AppError::not_found("Besitzer", id))
    }

    /// Delete an owner. Patients (and their records) cascade; invoices block.
    pub async fn delete_owner(&self, id: i64) -> Result<(), AppError> {
        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE owner_id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await?;

        if invoices > 0 {
            return Err(AppError::Conflict(format!(
                "Besitzer {} hat noch {} Rechnung(en)",
                id, invoices
            )));
        }

        let result = sqlx::query("DELETE FROM owners WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Besitzer", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_input(first: &str, last: &str) -> OwnerInput {
        OwnerInput {
            salutation: None,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: Some(format!("{}@example.de", first.to_lowercase())),
            phone: None,
            street: None,
            zip: None,
            city: Some("Hamburg".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_owner_crud() {
        let db = Database::new_in_memory().await.unwrap();

        let created = db.create_owner(&owner_input("Anna", "Schulz")).await.unwrap();
        assert_eq!(created.last_name, "Schulz");
        assert_eq!(created.email.as_deref(), Some("anna@example.de"));

        let mut input = owner_input("Anna", "Schulz-Berg");
        input.city = Some("  ".to_string());
        let updated = db.update_owner(created.id, &input).await.unwrap();
        assert_eq!(updated.last_name, "Schulz-Berg");
        assert_eq!(updated.city, None);

        let found = db.list_owners(Some("berg"), None, None).await.unwrap();
        assert_eq!(found.len(), 1);

        db.delete_owner(created.id).await.unwrap();
        assert!(db.get_owner(created.id).await.unwrap().is_none());
        assert!(matches!(
            db.delete_owner(created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_owner_validation() {
        let db = Database::new_in_memory().await.unwrap();

        let mut input = owner_input("Anna", " ");
        assert!(matches!(
            db.create_owner(&input).await,
            Err(AppError::ValidationError(_))
        ));

        input.last_name = "Schulz".to_string();
        input.email = Some("anna-at-example".to_string());
        assert!(matches!(
            db.create_owner(&input).await,
            Err(AppError::ValidationError(_))
        ));
    }
}
