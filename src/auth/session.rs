//! Server-side session storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::database::Database;
use crate::error::AppError;

/// A login session. The CSRF token lives and dies with it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    #[serde(skip_serializing)]
    pub csrf_token: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<(), AppError>;

    async fn get(&self, id: &str) -> Result<Option<Session>, AppError>;

    /// Push the expiry forward (sliding expiration).
    async fn touch(&self, id: &str, expires_at: DateTime<Utc>) -> Result<(), AppError>;

    async fn set_csrf_token(&self, id: &str, token: &str) -> Result<(), AppError>;

    async fn destroy(&self, id: &str) -> Result<(), AppError>;

    /// Remove every session that expired before `now`. Returns the count removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Sessions persisted in the `sessions` table.
#[derive(Clone)]
pub struct SqlSessionStore {
    database: Database,
}

impl SqlSessionStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn create(&self, session: &Session) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, csrf_token, ip_address, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(&session.csrf_token)
        .bind(&session.ip_address)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(self.database.pool())
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, AppError> {
        Ok(sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.database.pool())
            .await?)
    }

    async fn touch(&self, id: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
            .bind(expires_at)
            .bind(id)
            .execute(self.database.pool())
            .await?;
        Ok(())
    }

    async fn set_csrf_token(&self, id: &str, token: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE sessions SET csrf_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(self.database.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(self.database.pool())
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(self.database.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

/// Process-local sessions, lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn touch(&self, id: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn set_csrf_token(&self, id: &str, token: &str) -> Result<(), AppError> {
        match self.sessions.write().await.get_mut(id) {
            Some(session) => {
                session.csrf_token = token.to_string();
                Ok(())
            }
            None => Err(AppError::Unauthorized),
        }
    }

    async fn destroy(&self, id: &str) -> Result<(), AppError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}
