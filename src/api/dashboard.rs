use axum::extract::State;
use chrono::Utc;

use super::request::{ApiQuery, Selector};
use super::response::{success, ApiResult};
use super::unknown_action;
use crate::auth::CurrentUser;
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
) -> ApiResult {
    user.require(&state, "dashboard.view").await?;

    match selector.action.as_deref().unwrap_or("stats") {
        "stats" => success(state.database.dashboard_stats(Utc::now().date_naive()).await?),
        other => Err(unknown_action(other)),
    }
}
