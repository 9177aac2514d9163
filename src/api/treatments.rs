use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use super::request::{ActionRequest, ApiQuery, Selector};
use super::response::{created, success, success_with_message, ApiResult};
use super::{record_activity, unknown_action};
use crate::auth::CurrentUser;
use crate::database::treatments::TreatmentInput;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TreatmentListQuery {
    pub patient_id: Option<i64>,
}

pub async fn query(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(params): ApiQuery<TreatmentListQuery>,
) -> ApiResult {
    user.require(&state, "treatments.view").await?;

    match selector.action() {
        "list" => success(state.database.list_treatments(params.patient_id).await?),
        "get" => {
            let id = selector.require_id()?;
            let treatment = state
                .database
                .get_treatment(id)
                .await?
                .ok_or_else(|| AppError::not_found("Behandlung", id))?;
            success(treatment)
        }
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, user: CurrentUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            user.require(&state, "treatments.edit").await?;
            let input: TreatmentInput = request.parse()?;
            let treatment = state.database.create_treatment(&input).await?;
            record_activity(
                &state,
                &user,
                "treatment.create",
                "treatment",
                Some(treatment.id),
                Some(json!({"patient_id": treatment.patient_id, "therapy_type": treatment.therapy_type})),
            )
            .await;
            created(treatment, "Behandlung angelegt")
        }
        "update" => {
            user.require(&state, "treatments.edit").await?;
            let id = request.id()?;
            let input: TreatmentInput = request.parse()?;
            let treatment = state.database.update_treatment(id, &input).await?;
            record_activity(&state, &user, "treatment.update", "treatment", Some(id), None).await;
            success_with_message(treatment, "Behandlung gespeichert")
        }
        "delete" => {
            user.require(&state, "treatments.delete").await?;
            let id = request.id()?;
            state.database.delete_treatment(id).await?;
            record_activity(&state, &user, "treatment.delete", "treatment", Some(id), None).await;
            success_with_message(json!({"id": id}), "Behandlung gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
