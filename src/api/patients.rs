use axum::extract::State;
use serde_json::json;

use super::request::{ActionRequest, ApiQuery, Selector};
use super::response::{created, success, success_with_message, ApiResult};
use super::{record_activity, unknown_action};
use crate::auth::CurrentUser;
use crate::database::patients::{PatientFilter, PatientInput};
use crate::error::AppError;
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(filter): ApiQuery<PatientFilter>,
) -> ApiResult {
    user.require(&state, "patients.view").await?;

    match selector.action() {
        "list" => success(state.database.list_patients(&filter).await?),
        "get" => {
            let id = selector.require_id()?;
            let patient = state
                .database
                .get_patient(id)
                .await?
                .ok_or_else(|| AppError::not_found("Patient", id))?;
            success(patient)
        }
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, user: CurrentUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            user.require(&state, "patients.edit").await?;
            let input: PatientInput = request.parse()?;
            let patient = state.database.create_patient(&input).await?;
            record_activity(
                &state,
                &user,
                "patient.create",
                "patient",
                Some(patient.id),
                Some(json!({"name": patient.name, "owner_id": patient.owner_id})),
            )
            .await;
            created(patient, "Patient angelegt")
        }
        "update" => {
            user.require(&state, "patients.edit").await?;
            let id = request.id()?;
            let input: PatientInput = request.parse()?;
            let patient = state.database.update_patient(id, &input).await?;
            record_activity(&state, &user, "patient.update", "patient", Some(id), None).await;
            success_with_message(patient, "Patient gespeichert")
        }
        "delete" => {
            user.require(&state, "patients.delete").await?;
            let id = request.id()?;
            state.database.delete_patient(id).await?;
            record_activity(&state, &user, "patient.delete", "patient", Some(id), None).await;
            success_with_message(json!({"id": id}), "Patient gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
