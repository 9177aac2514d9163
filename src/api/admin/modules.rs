use axum::extract::State;
use serde_json::{json, Value};

use crate::api::request::{ActionRequest, ApiQuery, Selector};
use crate::api::response::{success, success_with_message, ApiResult};
use crate::api::{record_activity, unknown_action};
use crate::auth::AdminUser;
use crate::error::AppError;
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(selector): ApiQuery<Selector>,
) -> ApiResult {
    match selector.action() {
        "list" => success(state.database.list_modules().await?),
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, AdminUser(admin): AdminUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "toggle" => {
            let key: String = request.field("module_key")?;
            let current = state
                .database
                .get_module(&key)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Modul {} nicht gefunden", key)))?;
            let enabled = request
                .optional_field::<bool>("is_enabled")?
                .unwrap_or(!current.is_enabled);
            let module = state.database.set_module_enabled(&key, enabled).await?;
            record_activity(
                &state,
                &admin,
                "module.toggle",
                "module",
                Some(module.id),
                Some(json!({"module_key": key, "is_enabled": enabled})),
            )
            .await;
            success(module)
        }
        "update_config" => {
            let key: String = request.field("module_key")?;
            let config: Value = request.field("config")?;
            let module = state.database.update_module_config(&key, &config).await?;
            record_activity(
                &state,
                &admin,
                "module.update_config",
                "module",
                Some(module.id),
                Some(json!({"module_key": key})),
            )
            .await;
            success_with_message(module, "Moduleinstellungen gespeichert")
        }
        other => Err(unknown_action(other)),
    }
}
