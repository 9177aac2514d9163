//! Users, roles and the role → permission mapping.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::models::{Permission, Role, RoleWithPermissions, User};
use super::{required, valid_email, Database};
use crate::error::AppError;

/// Name of the role that implicitly holds every permission.
pub const ADMIN_ROLE: &str = "admin";

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.first_name, u.last_name,
           u.role_id, r.name AS role_name, u.is_active, u.last_login, u.created_at, u.updated_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

/// Validated user fields as stored. The password is already hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
}

impl UserRecord {
    fn normalized(&self) -> Result<UserRecord, AppError> {
        let username = required(&self.username, "username")?;
        if username.len() < 3
            || !username
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == '-')
        {
            return Err(AppError::ValidationError(format!(
                "Ungültiger Benutzername: {}",
                username
            )));
        }

        let email = required(&self.email, "email")?;
        if !valid_email(&email) {
            return Err(AppError::ValidationError(format!(
                "Ungültige E-Mail-Adresse: {}",
                email
            )));
        }

        Ok(UserRecord {
            username,
            email,
            password_hash: self.password_hash.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            role: required(&self.role, "role")?,
            is_active: self.is_active,
        })
    }
}

impl Database {
    /// Look up a user by username or email, case-insensitively.
    pub async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "{} WHERE u.username = ?1 OR u.email = ?1",
            USER_SELECT
        ))
        .bind(identifier.trim())
        .fetch_optional(self.pool())
        .await?)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(&format!("{} WHERE u.id = ?", USER_SELECT))
            .bind(id)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(&format!("{} ORDER BY u.username", USER_SELECT))
            .fetch_all(self.pool())
            .await?)
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?)
    }

    pub async fn count_active_admins(&self) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM users u JOIN roles r ON r.id = u.role_id WHERE r.name = ? AND u.is_active = 1",
        )
        .bind(ADMIN_ROLE)
        .fetch_one(self.pool())
        .await?)
    }

    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        Ok(sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?)
    }

    async fn role_id_for(&self, name: &str) -> Result<i64, AppError> {
        self.get_role_by_name(name)
            .await?
            .map(|r| r.id)
            .ok_or_else(|| AppError::ValidationError(format!("Unbekannte Rolle: {}", name)))
    }

    pub async fn create_user(&self, record: &UserRecord) -> Result<User, AppError> {
        let record = record.normalized()?;
        let password_hash = record
            .password_hash
            .clone()
            .ok_or_else(|| AppError::missing_field("password"))?;
        let role_id = self.role_id_for(&record.role).await?;
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name, role_id, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.username)
        .bind(&record.email)
        .bind(&password_hash)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(role_id)
        .bind(record.is_active)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("Benutzer", id))
    }

    /// Update a user. A `None` password hash keeps the current password.
    pub async fn update_user(&self, id: i64, record: &UserRecord) -> Result<User, AppError> {
        let record = record.normalized()?;
        let role_id = self.role_id_for(&record.role).await?;

        let result = sqlx::query(
            r#"
            UPDATE users SET username = ?, email = ?, password_hash = COALESCE(?, password_hash),
                first_name = ?, last_name = ?, role_id = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.username)
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(role_id)
        .bind(record.is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Benutzer", id));
        }
        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("Benutzer", id))
    }

    pub async fn set_user_active(&self, id: i64, active: bool) -> Result<User, AppError> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Benutzer", id));
        }
        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("Benutzer", id))
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Benutzer", id));
        }
        Ok(())
    }

    pub async fn record_login(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Permission names granted to a role through `role_permissions`.
    pub async fn role_permissions(&self, role_id: i64) -> Result<Vec<String>, AppError> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT p.name FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = ?
            ORDER BY p.name
            "#,
        )
        .bind(role_id)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn role_has_permission(&self, role_id: i64, permission: &str) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = ? AND p.name = ?
            "#,
        )
        .bind(role_id)
        .bind(permission)
        .fetch_optional(self.pool())
        .await?;
        Ok(found.is_some())
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        Ok(sqlx::query_as::<_, Permission>(
            "SELECT id, name, description FROM permissions ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, AppError> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles ORDER BY id")
            .fetch_all(self.pool())
            .await?;

        let mut result = Vec::with_capacity(roles.len());
        for role in roles {
            let permissions = self.role_permissions(role.id).await?;
            result.push(RoleWithPermissions { role, permissions });
        }
        Ok(result)
    }

    /// Replace a role's permission set in one transaction.
    pub async fn set_role_permissions(&self, role_id: i64, names: &[String]) -> Result<Vec<String>, AppError> {
        let role: Option<Role> = sqlx::query_as("SELECT id, name, description FROM roles WHERE id = ?")
            .bind(role_id)
            .fetch_optional(self.pool())
            .await?;
        let role = role.ok_or_else(|| AppError::not_found("Rolle", role_id))?;
        if role.name == ADMIN_ROLE {
            return Err(AppError::Conflict(
                "Die Administratorrolle hat immer alle Berechtigungen".to_string(),
            ));
        }

        let known: Vec<String> = self.list_permissions().await?.into_iter().map(|p| p.name).collect();
        if let Some(unknown) = names.iter().find(|n| !known.contains(n)) {
            return Err(AppError::ValidationError(format!(
                "Unbekannte Berechtigung: {}",
                unknown
            )));
        }

        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        for name in names {
            sqlx::query(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission_id) SELECT ?, id FROM permissions WHERE name = ?",
            )
            .bind(role_id)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.role_permissions(role_id).await
    }
}
