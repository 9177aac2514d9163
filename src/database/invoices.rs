//! Invoices and their line items.
//!
//! Amounts are integer cents. Line and invoice totals are derived from the
//! items on every write, never accepted from the client.

use chrono::{Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, Transaction};

use super::models::{Invoice, InvoiceItem, InvoiceWithItems};
use super::settings::{DEFAULT_TAX_RATE_KEY, INVOICE_DUE_DAYS_KEY, MAX_INVOICE_DUE_DAYS};
use super::{clean, page_limit, required, Database};
use crate::error::AppError;

const FALLBACK_TAX_RATE: f64 = 19.0;
const FALLBACK_DUE_DAYS: i64 = 14;

/// Largest accepted unit price, in cents either way of zero.
pub const MAX_UNIT_PRICE_CENTS: i64 = 10_000_000_000;
pub const MAX_QUANTITY: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Whether header and items may still be edited.
    pub fn is_editable(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Open)
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Cancelled)
    }

    /// Allowed status changes. Cancelled is final; a paid invoice can only
    /// be cancelled, and only by an administrator.
    pub fn can_transition_to(&self, next: InvoiceStatus, by_admin: bool) -> bool {
        use InvoiceStatus::*;
        match (*self, next) {
            (Draft, Open | Paid | Cancelled) => true,
            (Open, Draft | Paid | Overdue | Cancelled) => true,
            (Overdue, Open | Paid | Cancelled) => true,
            (Paid, Cancelled) => by_admin,
            _ => false,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "open" => Ok(InvoiceStatus::Open),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            _ => Err(AppError::ValidationError(format!(
                "Ungültiger Rechnungsstatus: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItemInput {
    pub description: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
    /// Percent; the practice default applies when absent.
    #[serde(default)]
    pub tax_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceInput {
    pub owner_id: i64,
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemInput>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub net_cents: i64,
    pub tax_cents: i64,
    pub gross_cents: i64,
}

/// Net and tax for one line, each rounded to whole cents.
pub fn line_amounts(quantity: f64, unit_price_cents: i64, tax_rate: f64) -> (i64, i64) {
    let net = (quantity * unit_price_cents as f64).round() as i64;
    let tax = (net as f64 * tax_rate / 100.0).round() as i64;
    (net, tax)
}

pub fn totals_for(lines: &[(i64, i64)]) -> Result<InvoiceTotals, AppError> {
    let overflow = || AppError::ValidationError("Rechnungssumme ist zu groß".to_string());
    let mut totals = InvoiceTotals::default();
    for (net, tax) in lines {
        totals.net_cents = totals.net_cents.checked_add(*net).ok_or_else(overflow)?;
        totals.tax_cents = totals.tax_cents.checked_add(*tax).ok_or_else(overflow)?;
    }
    totals.gross_cents = totals
        .net_cents
        .checked_add(totals.tax_cents)
        .ok_or_else(overflow)?;
    Ok(totals)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub owner_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Next number in the `PREFIX-YEAR-NNNN` sequence.
pub fn next_invoice_number(prefix: &str, year: i32, existing: &[String]) -> String {
    let stem = format!("{}-{}-", prefix, year);
    let last = existing
        .iter()
        .filter_map(|number| number.strip_prefix(&stem))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:04}", stem, last + 1)
}

struct PreparedItem {
    description: String,
    quantity: f64,
    unit_price_cents: i64,
    tax_rate: f64,
    net_cents: i64,
    tax_cents: i64,
}

fn prepare_items(
    items: &[InvoiceItemInput],
    default_tax_rate: f64,
) -> Result<Vec<PreparedItem>, AppError> {
    if items.is_empty() {
        return Err(AppError::ValidationError(
            "Eine Rechnung braucht mindestens eine Position".to_string(),
        ));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let description = required(&item.description, &format!("items[{}].description", index))?;
            if !item.quantity.is_finite() || item.quantity <= 0.0 || item.quantity > MAX_QUANTITY {
                return Err(AppError::ValidationError(format!(
                    "items[{}].quantity muss größer als 0 und höchstens {} sein",
                    index, MAX_QUANTITY
                )));
            }
            if item.unit_price_cents.checked_abs().map_or(true, |p| p > MAX_UNIT_PRICE_CENTS) {
                return Err(AppError::ValidationError(format!(
                    "items[{}].unit_price_cents darf höchstens {} betragen",
                    index, MAX_UNIT_PRICE_CENTS
                )));
            }
            let tax_rate = item.tax_rate.unwrap_or(default_tax_rate);
            if !(0.0..=100.0).contains(&tax_rate) {
                return Err(AppError::ValidationError(format!(
                    "items[{}].tax_rate muss zwischen 0 und 100 liegen",
                    index
                )));
            }
            let (net_cents, tax_cents) = line_amounts(item.quantity, item.unit_price_cents, tax_rate);
            Ok(PreparedItem {
                description,
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                tax_rate,
                net_cents,
                tax_cents,
            })
        })
        .collect()
}

async fn insert_items(
    tx: &mut Transaction<'_, Sqlite>,
    invoice_id: i64,
    items: &[PreparedItem],
) -> Result<InvoiceTotals, AppError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (invoice_id, position, description, quantity, unit_price_cents,
                                       tax_rate, net_cents, tax_cents)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice_id)
        .bind(position as i64 + 1)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.tax_rate)
        .bind(item.net_cents)
        .bind(item.tax_cents)
        .execute(&mut **tx)
        .await?;
    }

    let lines: Vec<(i64, i64)> = items.iter().map(|i| (i.net_cents, i.tax_cents)).collect();
    totals_for(&lines)
}

impl Database {
    async fn invoice_defaults(&self) -> Result<(f64, i64, String), AppError> {
        let tax_rate = self
            .get_setting(DEFAULT_TAX_RATE_KEY)
            .await?
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|rate| (0.0..=100.0).contains(rate))
            .unwrap_or(FALLBACK_TAX_RATE);
        let due_days = self
            .get_setting(INVOICE_DUE_DAYS_KEY)
            .await?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|days| (0..=MAX_INVOICE_DUE_DAYS).contains(days))
            .unwrap_or(FALLBACK_DUE_DAYS);
        let prefix = self
            .get_setting("invoice_prefix")
            .await?
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "RE".to_string());
        Ok((tax_rate, due_days, prefix))
    }

    pub async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM invoices WHERE 1 = 1");

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ").push_bind(owner_id);
        }

        query
            .push(" ORDER BY issue_date DESC, id DESC LIMIT ")
            .push_bind(page_limit(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        Ok(query.build_query_as::<Invoice>().fetch_all(self.pool()).await?)
    }

    pub async fn get_invoice(&self, id: i64) -> Result<Option<InvoiceWithItems>, AppError> {
        let Some(invoice) = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;

        Ok(Some(InvoiceWithItems { invoice, items }))
    }

    async fn check_invoice_refs(&self, input: &InvoiceInput) -> Result<(), AppError> {
        if self.get_owner(input.owner_id).await?.is_none() {
            return Err(AppError::ValidationError(format!(
                "Besitzer {} existiert nicht",
                input.owner_id
            )));
        }

        if let Some(patient_id) = input.patient_id {
            match self.get_patient(patient_id).await? {
                Some(p) if p.patient.owner_id == input.owner_id => {}
                Some(_) => {
                    return Err(AppError::ValidationError(format!(
                        "Patient {} gehört nicht zu Besitzer {}",
                        patient_id, input.owner_id
                    )))
                }
                None => {
                    return Err(AppError::ValidationError(format!(
                        "Patient {} existiert nicht",
                        patient_id
                    )))
                }
            }
        }
        Ok(())
    }

    pub async fn create_invoice(&self, input: &InvoiceInput) -> Result<InvoiceWithItems, AppError> {
        let (tax_rate, due_days, prefix) = self.invoice_defaults().await?;
        let items = prepare_items(&input.items, tax_rate)?;
        self.check_invoice_refs(input).await?;

        let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_date = match input.due_date {
            Some(date) => date,
            None => issue_date
                .checked_add_days(Days::new(due_days.unsigned_abs()))
                .ok_or_else(|| AppError::ValidationError("Ungültiges Rechnungsdatum".to_string()))?,
        };
        if due_date < issue_date {
            return Err(AppError::ValidationError(
                "Fälligkeitsdatum liegt vor dem Rechnungsdatum".to_string(),
            ));
        }

        let mut tx = self.pool().begin().await?;

        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT invoice_number FROM invoices WHERE invoice_number LIKE ?",
        )
        .bind(format!("{}-{}-%", prefix, issue_date.year()))
        .fetch_all(&mut *tx)
        .await?;
        let invoice_number = next_invoice_number(&prefix, issue_date.year(), &existing);
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO invoices (invoice_number, owner_id, patient_id, issue_date, due_date, status,
                                  notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'draft', ?, ?, ?)
            "#,
        )
        .bind(&invoice_number)
        .bind(input.owner_id)
        .bind(input.patient_id)
        .bind(issue_date)
        .bind(due_date)
        .bind(clean(&input.notes))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let totals = insert_items(&mut tx, id, &items).await?;
        store_totals(&mut tx, id, totals).await?;
        tx.commit().await?;

        self.get_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Rechnung", id))
    }

    /// Replace header fields and items of an editable invoice.
    pub async fn update_invoice(&self, id: i64, input: &InvoiceInput) -> Result<InvoiceWithItems, AppError> {
        let current = self
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Rechnung", id))?;
        let status: InvoiceStatus = current.invoice.status.parse()?;
        if !status.is_editable() {
            return Err(AppError::Conflict(format!(
                "Rechnung {} ist {} und kann nicht mehr bearbeitet werden",
                current.invoice.invoice_number, status
            )));
        }

        let (tax_rate, _, _) = self.invoice_defaults().await?;
        let items = prepare_items(&input.items, tax_rate)?;
        self.check_invoice_refs(input).await?;

        let issue_date = input.issue_date.unwrap_or(current.invoice.issue_date);
        let due_date = input.due_date.unwrap_or(current.invoice.due_date);
        if due_date < issue_date {
            return Err(AppError::ValidationError(
                "Fälligkeitsdatum liegt vor dem Rechnungsdatum".to_string(),
            ));
        }

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            UPDATE invoices SET owner_id = ?, patient_id = ?, issue_date = ?, due_date = ?, notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.owner_id)
        .bind(input.patient_id)
        .bind(issue_date)
        .bind(due_date)
        .bind(clean(&input.notes))
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let totals = insert_items(&mut tx, id, &items).await?;
        store_totals(&mut tx, id, totals).await?;
        tx.commit().await?;

        self.get_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Rechnung", id))
    }

    /// Move an invoice to `status`. Setting the current status again is a no-op.
    pub async fn set_invoice_status(
        &self,
        id: i64,
        status: InvoiceStatus,
        by_admin: bool,
    ) -> Result<InvoiceWithItems, AppError> {
        let current = self
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Rechnung", id))?;
        let from: InvoiceStatus = current.invoice.status.parse()?;
        if from == status {
            return Ok(current);
        }
        if !from.can_transition_to(status, by_admin) {
            return Err(AppError::Conflict(format!(
                "Rechnung {} kann nicht von {} nach {} wechseln",
                current.invoice.invoice_number, from, status
            )));
        }

        let paid_at = match status {
            InvoiceStatus::Paid => Some(Utc::now()),
            InvoiceStatus::Cancelled => current.invoice.paid_at,
            _ => None,
        };

        sqlx::query("UPDATE invoices SET status = ?, paid_at = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(status.as_str())
            .bind(paid_at)
            .bind(Utc::now())
            .bind(id)
            .bind(from.as_str())
            .execute(self.pool())
            .await?;

        self.get_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Rechnung", id))
    }

    pub async fn delete_invoice(&self, id: i64) -> Result<(), AppError> {
        let current = self
            .get_invoice(id)
            .await?
            .ok_or_else(|| AppError::not_found("Rechnung", id))?;
        let status: InvoiceStatus = current.invoice.status.parse()?;
        if !status.is_deletable() {
            return Err(AppError::Conflict(format!(
                "Rechnung {} ist {}; nur Entwürfe und stornierte Rechnungen können gelöscht werden",
                current.invoice.invoice_number, status
            )));
        }

        sqlx::query("DELETE FROM invoices WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Flag open invoices whose due date has passed. Returns the number changed.
    pub async fn mark_overdue_invoices(&self, today: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE invoices SET status = 'overdue', updated_at = ? WHERE status = 'open' AND due_date < ?",
        )
        .bind(Utc::now())
        .bind(today)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}

async fn store_totals(
    tx: &mut Transaction<'_, Sqlite>,
    invoice_id: i64,
    totals: InvoiceTotals,
) -> Result<(), AppError> {
    sqlx::query("UPDATE invoices SET net_cents = ?, tax_cents = ?, gross_cents = ? WHERE id = ?")
        .bind(totals.net_cents)
        .bind(totals.tax_cents)
        .bind(totals.gross_cents)
        .bind(invoice_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::fixtures;

    fn item(description: &str, quantity: f64, unit_price_cents: i64) -> InvoiceItemInput {
        InvoiceItemInput {
            description: description.to_string(),
            quantity,
            unit_price_cents,
            tax_rate: None,
        }
    }

    #[test]
    fn test_line_amounts_round_to_cents() {
        assert_eq!(line_amounts(1.0, 5000, 19.0), (5000, 950));
        assert_eq!(line_amounts(1.5, 3333, 19.0), (5000, 950));
        assert_eq!(line_amounts(3.0, 199, 7.0), (597, 42));
        assert_eq!(line_amounts(2.0, 1000, 0.0), (2000, 0));
    }

    #[test]
    fn test_next_invoice_number() {
        let existing = vec![
            "RE-2026-0001".to_string(),
            "RE-2026-0009".to_string(),
            "RE-2025-0042".to_string(),
            "GS-2026-0050".to_string(),
        ];
        assert_eq!(next_invoice_number("RE", 2026, &existing), "RE-2026-0010");
        assert_eq!(next_invoice_number("RE", 2027, &existing), "RE-2027-0001");
    }

    #[tokio::test]
    async fn test_invoice_totals_and_lifecycle() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;

        let input = InvoiceInput {
            owner_id: owner.id,
            patient_id: None,
            issue_date: NaiveDate::from_ymd_opt(2026, 4, 1),
            due_date: None,
            notes: None,
            items: vec![item("Erstbefund", 1.0, 6000), item("Unterwasserlaufband", 2.0, 2500)],
        };

        let created = db.create_invoice(&input).await.unwrap();
        assert_eq!(created.invoice.invoice_number, "RE-2026-0001");
        assert_eq!(created.invoice.status, "draft");
        assert_eq!(created.invoice.net_cents, 11000);
        assert_eq!(created.invoice.tax_cents, 2090);
        assert_eq!(created.invoice.gross_cents, 13090);
        assert_eq!(created.invoice.due_date, NaiveDate::from_ymd_opt(2026, 4, 15).unwrap());
        assert_eq!(created.items.len(), 2);

        let second = db.create_invoice(&input).await.unwrap();
        assert_eq!(second.invoice.invoice_number, "RE-2026-0002");

        let opened = db
            .set_invoice_status(created.invoice.id, InvoiceStatus::Open, false)
            .await
            .unwrap();
        assert_eq!(opened.invoice.status, "open");

        let overdue = db
            .mark_overdue_invoices(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(overdue, 1);

        assert!(matches!(
            db.delete_invoice(created.invoice.id).await,
            Err(AppError::Conflict(_))
        ));
        db.delete_invoice(second.invoice.id).await.unwrap();
    }

    #[test]
    fn test_status_transitions() {
        use InvoiceStatus::*;
        assert!(Draft.can_transition_to(Open, false));
        assert!(Open.can_transition_to(Paid, false));
        assert!(Overdue.can_transition_to(Paid, false));
        assert!(!Paid.can_transition_to(Draft, true));
        assert!(!Paid.can_transition_to(Open, true));
        assert!(!Paid.can_transition_to(Cancelled, false));
        assert!(Paid.can_transition_to(Cancelled, true));
        assert!(!Cancelled.can_transition_to(Draft, true));
    }

    #[test]
    fn test_totals_overflow_is_rejected() {
        assert!(totals_for(&[(i64::MAX, 0), (1, 0)]).is_err());
        assert!(totals_for(&[(i64::MAX - 5, 10)]).is_err());
        assert_eq!(
            totals_for(&[(5000, 950), (597, 42)]).unwrap(),
            InvoiceTotals {
                net_cents: 5597,
                tax_cents: 992,
                gross_cents: 6589,
            }
        );
    }

    #[tokio::test]
    async fn test_out_of_range_amounts_are_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;

        for bad in [
            item("Zu teuer", 1.0, i64::MAX),
            item("Zu billig", 1.0, i64::MIN),
            item("Zu viel", 1e300, 100),
        ] {
            let result = db
                .create_invoice(&InvoiceInput {
                    owner_id: owner.id,
                    patient_id: None,
                    issue_date: None,
                    due_date: None,
                    notes: None,
                    items: vec![bad],
                })
                .await;
            assert!(matches!(result, Err(AppError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_paid_invoice_is_locked() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;
        let input = InvoiceInput {
            owner_id: owner.id,
            patient_id: None,
            issue_date: None,
            due_date: None,
            notes: None,
            items: vec![item("Kontrolle", 1.0, 3000)],
        };
        let invoice = db.create_invoice(&input).await.unwrap();
        let id = invoice.invoice.id;

        let paid = db.set_invoice_status(id, InvoiceStatus::Paid, false).await.unwrap();
        assert!(paid.invoice.paid_at.is_some());

        assert!(matches!(
            db.set_invoice_status(id, InvoiceStatus::Draft, true).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(db.update_invoice(id, &input).await, Err(AppError::Conflict(_))));
        assert!(matches!(
            db.set_invoice_status(id, InvoiceStatus::Cancelled, false).await,
            Err(AppError::Conflict(_))
        ));

        let cancelled = db.set_invoice_status(id, InvoiceStatus::Cancelled, true).await.unwrap();
        assert_eq!(cancelled.invoice.status, "cancelled");
        assert_eq!(cancelled.invoice.paid_at, paid.invoice.paid_at);
    }

    #[tokio::test]
    async fn test_out_of_range_due_days_setting_falls_back() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;
        sqlx::query("UPDATE settings SET value = '1000000000' WHERE key = 'invoice_due_days'")
            .execute(db.pool())
            .await
            .unwrap();

        let invoice = db
            .create_invoice(&InvoiceInput {
                owner_id: owner.id,
                patient_id: None,
                issue_date: NaiveDate::from_ymd_opt(2026, 4, 1),
                due_date: None,
                notes: None,
                items: vec![item("Kontrolle", 1.0, 3000)],
            })
            .await
            .unwrap();
        assert_eq!(invoice.invoice.due_date, NaiveDate::from_ymd_opt(2026, 4, 15).unwrap());
    }

    #[tokio::test]
    async fn test_owner_with_invoices_cannot_be_deleted() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;

        db.create_invoice(&InvoiceInput {
            owner_id: owner.id,
            patient_id: None,
            issue_date: None,
            due_date: None,
            notes: None,
            items: vec![item("Kontrolle", 1.0, 3000)],
        })
        .await
        .unwrap();

        assert!(matches!(
            db.delete_owner(owner.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_invoice_without_items_is_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let owner = fixtures::owner(&db, "Krause").await;

        let result = db
            .create_invoice(&InvoiceInput {
                owner_id: owner.id,
                patient_id: None,
                issue_date: None,
                due_date: None,
                notes: None,
                items: vec![],
            })
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
