use axum::extract::State;
use serde_json::json;

use crate::api::request::{ActionRequest, ApiQuery, Selector};
use crate::api::response::{created, success, success_with_message, ApiResult};
use crate::api::{record_activity, unknown_action};
use crate::auth::AdminUser;
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(selector): ApiQuery<Selector>,
) -> ApiResult {
    match selector.action() {
        "list" => success(state.backups.list().await?),
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, AdminUser(admin): AdminUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            let backup = state.backups.create(Some(admin.id())).await?;
            record_activity(
                &state,
                &admin,
                "backup.create",
                "backup",
                Some(backup.id),
                Some(json!({"filename": backup.filename, "size_bytes": backup.size_bytes})),
            )
            .await;
            created(backup, "Sicherung erstellt")
        }
        "restore" => {
            let id = request.id()?;
            let backup = state.backups.get(id).await?;
            let statements = state.backups.restore(id).await?;
            // The restored activity log replaces the live one, so this entry lands after it.
            record_activity(
                &state,
                &admin,
                "backup.restore",
                "backup",
                Some(id),
                Some(json!({"filename": backup.filename, "statements": statements})),
            )
            .await;
            success_with_message(
                json!({"id": id, "statements": statements}),
                "Sicherung wiederhergestellt",
            )
        }
        "delete" => {
            let id = request.id()?;
            state.backups.delete(id).await?;
            record_activity(&state, &admin, "backup.delete", "backup", Some(id), None).await;
            success_with_message(json!({"id": id}), "Sicherung gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
