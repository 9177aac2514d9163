use axum::extract::State;
use serde_json::json;

use crate::api::request::{ActionRequest, ApiQuery, Selector};
use crate::api::response::{success, success_with_message, ApiResult};
use crate::api::{record_activity, unknown_action};
use crate::auth::AdminUser;
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(selector): ApiQuery<Selector>,
) -> ApiResult {
    match selector.action() {
        "list" => success(state.database.list_roles().await?),
        "permissions" => success(state.database.list_permissions().await?),
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, AdminUser(admin): AdminUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "set_permissions" => {
            let role_id = request.id()?;
            let names: Vec<String> = request.field("permissions")?;
            let granted = state.database.set_role_permissions(role_id, &names).await?;
            record_activity(
                &state,
                &admin,
                "role.set_permissions",
                "role",
                Some(role_id),
                Some(json!({"permissions": granted})),
            )
            .await;
            success_with_message(
                json!({"id": role_id, "permissions": granted}),
                "Berechtigungen gespeichert",
            )
        }
        other => Err(unknown_action(other)),
    }
}
