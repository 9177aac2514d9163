use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use super::request::{ActionRequest, ApiQuery, Selector};
use super::response::{created, success, success_with_message, ApiResult};
use super::{record_activity, unknown_action};
use crate::auth::CurrentUser;
use crate::database::documents::DocumentInput;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DocumentListQuery {
    pub patient_id: Option<i64>,
}

pub async fn query(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(params): ApiQuery<DocumentListQuery>,
) -> ApiResult {
    user.require(&state, "documents.view").await?;

    match selector.action() {
        "list" => {
            let patient_id = params
                .patient_id
                .ok_or_else(|| AppError::missing_field("patient_id"))?;
            success(state.database.list_documents(patient_id).await?)
        }
        "get" => {
            let id = selector.require_id()?;
            let document = state
                .database
                .get_document(id)
                .await?
                .ok_or_else(|| AppError::not_found("Dokument", id))?;
            success(document)
        }
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, user: CurrentUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            user.require(&state, "documents.edit").await?;
            let input: DocumentInput = request.parse()?;
            let document = state.database.create_document(&input, Some(user.id())).await?;
            record_activity(
                &state,
                &user,
                "document.create",
                "document",
                Some(document.id),
                Some(json!({"patient_id": document.patient_id, "title": document.title})),
            )
            .await;
            created(document, "Dokument gespeichert")
        }
        "delete" => {
            user.require(&state, "documents.delete").await?;
            let id = request.id()?;
            state.database.delete_document(id).await?;
            record_activity(&state, &user, "document.delete", "document", Some(id), None).await;
            success_with_message(json!({"id": id}), "Dokument gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
