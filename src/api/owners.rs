use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use super::request::{ActionRequest, ApiQuery, Selector};
use super::response::{created, success, success_with_message, ApiResult};
use super::{record_activity, unknown_action};
use crate::auth::CurrentUser;
use crate::database::owners::OwnerInput;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OwnerListQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn query(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(params): ApiQuery<OwnerListQuery>,
) -> ApiResult {
    user.require(&state, "owners.view").await?;

    match selector.action() {
        "list" => success(
            state
                .database
                .list_owners(params.q.as_deref(), params.limit, params.offset)
                .await?,
        ),
        "get" => {
            let id = selector.require_id()?;
            let owner = state
                .database
                .get_owner_detail(id)
                .await?
                .ok_or_else(|| AppError::not_found("Besitzer", id))?;
            success(owner)
        }
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, user: CurrentUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            user.require(&state, "owners.edit").await?;
            let input: OwnerInput = request.parse()?;
            let owner = state.database.create_owner(&input).await?;
            record_activity(
                &state,
                &user,
                "owner.create",
                "owner",
                Some(owner.id),
                Some(json!({"name": format!("{} {}", owner.first_name, owner.last_name)})),
            )
            .await;
            created(owner, "Besitzer angelegt")
        }
        "update" => {
            user.require(&state, "owners.edit").await?;
            let id = request.id()?;
            let input: OwnerInput = request.parse()?;
            let owner = state.database.update_owner(id, &input).await?;
            record_activity(&state, &user, "owner.update", "owner", Some(id), None).await;
            success_with_message(owner, "Besitzer gespeichert")
        }
        "delete" => {
            user.require(&state, "owners.delete").await?;
            let id = request.id()?;
            state.database.delete_owner(id).await?;
            record_activity(&state, &user, "owner.delete", "owner", Some(id), None).await;
            success_with_message(json!({"id": id}), "Besitzer gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
