use axum::extract::State;
use serde_json::json;

use super::request::{ActionRequest, ApiQuery, Selector};
use super::response::{created, success, success_with_message, ApiResult};
use super::{record_activity, unknown_action};
use crate::auth::CurrentUser;
use crate::database::invoices::{InvoiceFilter, InvoiceInput, InvoiceStatus};
use crate::error::AppError;
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(filter): ApiQuery<InvoiceFilter>,
) -> ApiResult {
    user.require(&state, "invoices.view").await?;

    match selector.action() {
        "list" => success(state.database.list_invoices(&filter).await?),
        "get" => {
            let id = selector.require_id()?;
            let invoice = state
                .database
                .get_invoice(id)
                .await?
                .ok_or_else(|| AppError::not_found("Rechnung", id))?;
            success(invoice)
        }
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, user: CurrentUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            user.require(&state, "invoices.edit").await?;
            let input: InvoiceInput = request.parse()?;
            let invoice = state.database.create_invoice(&input).await?;
            record_activity(
                &state,
                &user,
                "invoice.create",
                "invoice",
                Some(invoice.invoice.id),
                Some(json!({
                    "invoice_number": invoice.invoice.invoice_number,
                    "gross_cents": invoice.invoice.gross_cents,
                })),
            )
            .await;
            created(invoice, "Rechnung angelegt")
        }
        "update" => {
            user.require(&state, "invoices.edit").await?;
            let id = request.id()?;
            let input: InvoiceInput = request.parse()?;
            let invoice = state.database.update_invoice(id, &input).await?;
            record_activity(&state, &user, "invoice.update", "invoice", Some(id), None).await;
            success_with_message(invoice, "Rechnung gespeichert")
        }
        "set_status" => {
            user.require(&state, "invoices.edit").await?;
            let id = request.id()?;
            let status: InvoiceStatus = request.field("status")?;
            let invoice = state
                .database
                .set_invoice_status(id, status, user.is_admin())
                .await?;
            record_activity(
                &state,
                &user,
                "invoice.set_status",
                "invoice",
                Some(id),
                Some(json!({"status": status.as_str()})),
            )
            .await;
            success_with_message(invoice, "Status geändert")
        }
        "delete" => {
            user.require(&state, "invoices.delete").await?;
            let id = request.id()?;
            state.database.delete_invoice(id).await?;
            record_activity(&state, &user, "invoice.delete", "invoice", Some(id), None).await;
            success_with_message(json!({"id": id}), "Rechnung gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
