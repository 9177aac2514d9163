use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use crate::api::request::{ActionRequest, ApiQuery, Selector};
use crate::api::response::{created, success, success_with_message, ApiResult};
use crate::api::{record_activity, unknown_action};
use crate::auth::AdminUser;
use crate::database::cron_jobs::CronJobInput;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CronLogQuery {
    pub job_id: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn query(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(selector): ApiQuery<Selector>,
    ApiQuery(params): ApiQuery<CronLogQuery>,
) -> ApiResult {
    match selector.action() {
        "list" => success(state.database.list_cron_jobs().await?),
        "logs" => success(
            state
                .database
                .list_cron_logs(params.job_id, params.limit)
                .await?,
        ),
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, AdminUser(admin): AdminUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            let input: CronJobInput = request.parse()?;
            let job = state.database.create_cron_job(&input).await?;
            record_activity(
                &state,
                &admin,
                "cron.create",
                "cron_job",
                Some(job.id),
                Some(json!({"job_type": job.job_type, "interval_minutes": job.interval_minutes})),
            )
            .await;
            created(job, "Aufgabe angelegt")
        }
        "update" => {
            let id = request.id()?;
            let input: CronJobInput = request.parse()?;
            let job = state.database.update_cron_job(id, &input).await?;
            record_activity(&state, &admin, "cron.update", "cron_job", Some(id), None).await;
            success_with_message(job, "Aufgabe gespeichert")
        }
        "toggle" => {
            let id = request.id()?;
            let job = state.database.toggle_cron_job(id).await?;
            record_activity(
                &state,
                &admin,
                "cron.toggle",
                "cron_job",
                Some(id),
                Some(json!({"is_active": job.is_active})),
            )
            .await;
            success(job)
        }
        "run" => {
            let id = request.id()?;
            let job = state
                .database
                .get_cron_job(id)
                .await?
                .ok_or_else(|| AppError::not_found("Cron-Job", id))?;
            let log = state.cron.run_job(&job).await?;
            record_activity(
                &state,
                &admin,
                "cron.run",
                "cron_job",
                Some(id),
                Some(json!({"status": log.status})),
            )
            .await;
            success_with_message(log, "Aufgabe ausgeführt")
        }
        "delete" => {
            let id = request.id()?;
            state.database.delete_cron_job(id).await?;
            record_activity(&state, &admin, "cron.delete", "cron_job", Some(id), None).await;
            success_with_message(json!({"id": id}), "Aufgabe gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
