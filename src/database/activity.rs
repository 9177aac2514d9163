use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::models::ActivityEntry;
use super::{page_limit, Database};
use crate::error::AppError;

/// One activity-log entry to record.
#[derive(Debug, Clone, Default)]
pub struct NewActivity<'a> {
    pub user_id: Option<i64>,
    pub action: &'a str,
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<i64>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<&'a str>,
}

impl Database {
    pub async fn log_activity(&self, entry: NewActivity<'_>) -> Result<(), AppError> {
        let details = entry.details.map(|d| d.to_string());

        sqlx::query(
            r#"
            INSERT INTO activity_log (user_id, action, entity_type, entity_id, details, ip_address, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(details)
        .bind(entry.ip_address)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn list_activity(
        &self,
        user_id: Option<i64>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ActivityEntry>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT a.id, a.user_id, u.username, a.action, a.entity_type, a.entity_id,
                   a.details, a.ip_address, a.created_at
            FROM activity_log a
            LEFT JOIN users u ON u.id = a.user_id
            "#,
        );

        if let Some(user_id) = user_id {
            query.push(" WHERE a.user_id = ").push_bind(user_id);
        }

        query
            .push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ")
            .push_bind(page_limit(limit))
            .push(" OFFSET ")
            .push_bind(offset.unwrap_or(0).max(0));

        Ok(query
            .build_query_as::<ActivityEntry>()
            .fetch_all(self.pool())
            .await?)
    }

    /// Delete entries older than `cutoff`. Returns the number removed.
    pub async fn prune_activity(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM activity_log WHERE created_at < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
