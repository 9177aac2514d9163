use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};

use super::appointments::day_start;
use super::models::DashboardStats;
use super::Database;
use crate::error::AppError;

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let start = first_of_month(date);
    let (year, month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(start + Duration::days(31))
}

impl Database {
    /// Headline counters for the given day.
    pub async fn dashboard_stats(&self, today: NaiveDate) -> Result<DashboardStats, AppError> {
        let active_patients: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients WHERE is_active = 1")
            .fetch_one(self.pool())
            .await?;

        let owners: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM owners")
            .fetch_one(self.pool())
            .await?;

        let appointments_today: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments WHERE starts_at >= ? AND starts_at < ? AND status != 'cancelled'",
        )
        .bind(day_start(today))
        .bind(day_start(today + Duration::days(1)))
        .fetch_one(self.pool())
        .await?;

        let open_invoices: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE status IN ('open', 'overdue')")
                .fetch_one(self.pool())
                .await?;

        let month_start = Utc.from_utc_datetime(&day_start(first_of_month(today)));
        let month_end = Utc.from_utc_datetime(&day_start(first_of_next_month(today)));
        let revenue_this_month_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(gross_cents), 0) FROM invoices WHERE status = 'paid' AND paid_at >= ? AND paid_at < ?",
        )
        .bind(month_start)
        .bind(month_end)
        .fetch_one(self.pool())
        .await?;

        Ok(DashboardStats {
            active_patients,
            owners,
            appointments_today,
            open_invoices,
            revenue_this_month_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fixtures;

    #[test]
    fn test_month_boundaries() {
        let d = NaiveDate::from_ymd_opt(2026, 12, 17).unwrap();
        assert_eq!(first_of_month(d), NaiveDate::from_ymd_opt(2026, 12, 1).unwrap());
        assert_eq!(first_of_next_month(d), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn test_dashboard_counts() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;
        fixtures::patient(&db, owner.id, "Luna").await;
        fixtures::patient(&db, owner.id, "Bello").await;

        let stats = db.dashboard_stats(Utc::now().date_naive()).await.unwrap();
        assert_eq!(stats.owners, 1);
        assert_eq!(stats.active_patients, 2);
        assert_eq!(stats.appointments_today, 0);
        assert_eq!(stats.revenue_this_month_cents, 0);
    }
}
