//! Consistency checks for a running installation.
//!
//! Database checks run against the pool directly. The HTTP smoke checks
//! talk to a deployed server with `reqwest`.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub checks: Vec<CheckResult>,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn extend(&mut self, other: IntegrityReport) {
        self.checks.extend(other.checks);
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let mark = if check.passed { "ok  " } else { "FAIL" };
            writeln!(f, "[{}] {}: {}", mark, check.name, check.detail)?;
        }
        let failed = self.failures().count();
        write!(f, "{} checks, {} failed", self.checks.len(), failed)
    }
}

pub async fn run_database_checks(database: &Database) -> Result<IntegrityReport, AppError> {
    let mut report = IntegrityReport::default();

    let violations: Vec<(String, Option<i64>)> = sqlx::query_as(r#"SELECT "table", rowid FROM pragma_foreign_key_check"#)
        .fetch_all(database.pool())
        .await?;
    report.checks.push(if violations.is_empty() {
        CheckResult::pass("foreign_keys", "no dangling references")
    } else {
        let sample: Vec<String> = violations
            .iter()
            .take(5)
            .map(|(table, rowid)| format!("{}#{}", table, rowid.unwrap_or_default()))
            .collect();
        CheckResult::fail(
            "foreign_keys",
            format!("{} violations, e.g. {}", violations.len(), sample.join(", ")),
        )
    });

    let mismatched: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT i.invoice_number
        FROM invoices i
        LEFT JOIN (
            SELECT invoice_id, SUM(net_cents) AS net, SUM(tax_cents) AS tax
            FROM invoice_items GROUP BY invoice_id
        ) t ON t.invoice_id = i.id
        WHERE i.net_cents != COALESCE(t.net, 0)
           OR i.tax_cents != COALESCE(t.tax, 0)
           OR i.gross_cents != i.net_cents + i.tax_cents
        ORDER BY i.id
        "#,
    )
    .fetch_all(database.pool())
    .await?;
    report.checks.push(if mismatched.is_empty() {
        CheckResult::pass("invoice_totals", "totals match their items")
    } else {
        CheckResult::fail(
            "invoice_totals",
            format!("totals differ from items: {}", mismatched.join(", ")),
        )
    });

    let admins = database.count_active_admins().await?;
    report.checks.push(if admins > 0 {
        CheckResult::pass("active_admin", format!("{} active administrator(s)", admins))
    } else {
        CheckResult::fail("active_admin", "no active administrator account")
    });

    let pending: Vec<String> = database
        .migration_status()
        .await?
        .into_iter()
        .filter(|m| !m.is_applied())
        .map(|m| m.name)
        .collect();
    report.checks.push(if pending.is_empty() {
        CheckResult::pass("migrations", "all migrations applied")
    } else {
        CheckResult::fail("migrations", format!("pending: {}", pending.join(", ")))
    });

    Ok(report)
}

fn is_error_envelope(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some("error")
        && body.get("message").map(Value::is_string).unwrap_or(false)
}

/// Probe a running server: `/health` must answer healthy and a protected
/// endpoint must refuse an anonymous request with 401.
pub async fn run_http_smoke(base_url: &str) -> Result<IntegrityReport, AppError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
    let base = base_url.trim_end_matches('/');
    let mut report = IntegrityReport::default();

    let health_url = format!("{}/health", base);
    debug!("Probing {}", health_url);
    report.checks.push(match client.get(&health_url).send().await {
        Ok(response) if response.status() == StatusCode::OK => match response.json::<Value>().await {
            Ok(body) if body.get("status").and_then(Value::as_str) == Some("healthy") => {
                CheckResult::pass("http_health", "server reports healthy")
            }
            Ok(body) => CheckResult::fail("http_health", format!("unexpected body: {}", body)),
            Err(e) => CheckResult::fail("http_health", format!("invalid JSON: {}", e)),
        },
        Ok(response) => CheckResult::fail("http_health", format!("status {}", response.status())),
        Err(e) => {
            warn!("Health probe failed: {}", e);
            CheckResult::fail("http_health", format!("request failed: {}", e))
        }
    });

    let protected_url = format!("{}/api/owners", base);
    report.checks.push(
        match client
            .get(&protected_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                match response.json::<Value>().await {
                    Ok(body) if is_error_envelope(&body) => {
                        CheckResult::pass("http_auth_guard", "anonymous request rejected with 401")
                    }
                    Ok(body) => CheckResult::fail(
                        "http_auth_guard",
                        format!("401 without error envelope: {}", body),
                    ),
                    Err(e) => CheckResult::fail("http_auth_guard", format!("invalid JSON: {}", e)),
                }
            }
            Ok(response) => CheckResult::fail(
                "http_auth_guard",
                format!("expected 401, got {}", response.status()),
            ),
            Err(e) => CheckResult::fail("http_auth_guard", format!("request failed: {}", e)),
        },
    );

    Ok(report)
}
