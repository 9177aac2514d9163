use axum::extract::State;
use serde_json::json;

use super::request::{ActionRequest, ApiQuery, Selector};
use super::response::{created, success, success_with_message, ApiResult};
use super::{record_activity, unknown_action};
use crate::auth::CurrentUser;
use crate::database::notes::{NoteFilter, NoteInput};
use crate::error::AppError;
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(filter): ApiQuery<NoteFilter>,
) -> ApiResult {
    user.require(&state, "notes.view").await?;

    match selector.action() {
        "list" => success(state.database.list_notes(&filter).await?),
        "get" => {
            let id = selector.require_id()?;
            let note = state
                .database
                .get_note(id)
                .await?
                .ok_or_else(|| AppError::not_found("Notiz", id))?;
            success(note)
        }
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, user: CurrentUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            user.require(&state, "notes.edit").await?;
            let input: NoteInput = request.parse()?;
            let note = state.database.create_note(&input, Some(user.id())).await?;
            record_activity(&state, &user, "note.create", "note", Some(note.id), None).await;
            created(note, "Notiz angelegt")
        }
        "update" => {
            user.require(&state, "notes.edit").await?;
            let id = request.id()?;
            let input: NoteInput = request.parse()?;
            let note = state.database.update_note(id, &input).await?;
            record_activity(&state, &user, "note.update", "note", Some(id), None).await;
            success_with_message(note, "Notiz gespeichert")
        }
        "delete" => {
            user.require(&state, "notes.delete").await?;
            let id = request.id()?;
            state.database.delete_note(id).await?;
            record_activity(&state, &user, "note.delete", "note", Some(id), None).await;
            success_with_message(json!({"id": id}), "Notiz gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
