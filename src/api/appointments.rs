use axum::extract::State;
use serde_json::json;

use super::request::{ActionRequest, ApiQuery, Selector};
use super::response::{created, success, success_with_message, ApiResult};
use super::{record_activity, unknown_action};
use crate::auth::CurrentUser;
use crate::database::appointments::{AppointmentFilter, AppointmentInput, AppointmentStatus};
use crate::error::AppError;
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(filter): ApiQuery<AppointmentFilter>,
) -> ApiResult {
    user.require(&state, "appointments.view").await?;

    match selector.action() {
        "list" => success(state.database.list_appointments(&filter).await?),
        "get" => {
            let id = selector.require_id()?;
            let appointment = state
                .database
                .get_appointment(id)
                .await?
                .ok_or_else(|| AppError::not_found("Termin", id))?;
            success(appointment)
        }
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, user: CurrentUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            user.require(&state, "appointments.edit").await?;
            let input: AppointmentInput = request.parse()?;
            let appointment = state.database.create_appointment(&input).await?;
            record_activity(
                &state,
                &user,
                "appointment.create",
                "appointment",
                Some(appointment.id),
                Some(json!({"patient_id": appointment.patient_id, "starts_at": appointment.starts_at})),
            )
            .await;
            created(appointment, "Termin angelegt")
        }
        "update" => {
            user.require(&state, "appointments.edit").await?;
            let id = request.id()?;
            let input: AppointmentInput = request.parse()?;
            let appointment = state.database.update_appointment(id, &input).await?;
            record_activity(&state, &user, "appointment.update", "appointment", Some(id), None).await;
            success_with_message(appointment, "Termin gespeichert")
        }
        "set_status" => {
            user.require(&state, "appointments.edit").await?;
            let id = request.id()?;
            let status: AppointmentStatus = request.field("status")?;
            let appointment = state.database.set_appointment_status(id, status).await?;
            record_activity(
                &state,
                &user,
                "appointment.set_status",
                "appointment",
                Some(id),
                Some(json!({"status": status.as_str()})),
            )
            .await;
            success_with_message(appointment, "Status geändert")
        }
        "delete" => {
            user.require(&state, "appointments.delete").await?;
            let id = request.id()?;
            state.database.delete_appointment(id).await?;
            record_activity(&state, &user, "appointment.delete", "appointment", Some(id), None).await;
            success_with_message(json!({"id": id}), "Termin gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
