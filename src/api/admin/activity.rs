use axum::extract::State;
use serde::Deserialize;

use crate::api::request::{ApiQuery, Selector};
use crate::api::response::{success, ApiResult};
use crate::api::unknown_action;
use crate::auth::AdminUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub user_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn query(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(params): ApiQuery<ActivityQuery>,
) -> ApiResult {
    match selector.action() {
        "list" => success(
            state
                .database
                .list_activity(params.user_id, params.limit, params.offset)
                .await?,
        ),
        other => Err(unknown_action(other)),
    }
}
