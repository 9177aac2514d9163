use axum::extract::State;
use serde_json::{json, Map, Value};

use crate::api::request::{ActionRequest, ApiQuery, Selector};
use crate::api::response::{created, success, success_with_message, ApiResult};
use crate::api::{record_activity, unknown_action};
use crate::auth::AdminUser;
use crate::database::email_templates::EmailTemplateInput;
use crate::database::models::EmailTemplate;
use crate::email::{self, load_smtp_settings, render_template, save_smtp_settings, SmtpSettings};
use crate::error::AppError;
use crate::state::AppState;

async fn load_template(state: &AppState, id: i64) -> Result<EmailTemplate, AppError> {
    state
        .database
        .get_email_template(id)
        .await?
        .ok_or_else(|| AppError::not_found("E-Mail-Vorlage", id))
}

pub async fn query(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(selector): ApiQuery<Selector>,
) -> ApiResult {
    match selector.action() {
        "list" => success(state.database.list_email_templates().await?),
        "get" => {
            let template = load_template(&state, selector.require_id()?).await?;
            let placeholders = email::placeholders(&format!("{}\n{}", template.subject, template.body));
            success(json!({"template": template, "placeholders": placeholders}))
        }
        "smtp" => {
            let settings = load_smtp_settings(&state.database).await?;
            success(settings.map(|s| s.masked()))
        }
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, AdminUser(admin): AdminUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            let input: EmailTemplateInput = request.parse()?;
            let template = state.database.create_email_template(&input).await?;
            record_activity(
                &state,
                &admin,
                "email_template.create",
                "email_template",
                Some(template.id),
                Some(json!({"template_key": template.template_key})),
            )
            .await;
            created(template, "Vorlage angelegt")
        }
        "update" => {
            let id = request.id()?;
            let input: EmailTemplateInput = request.parse()?;
            let template = state.database.update_email_template(id, &input).await?;
            record_activity(&state, &admin, "email_template.update", "email_template", Some(id), None).await;
            success_with_message(template, "Vorlage gespeichert")
        }
        "delete" => {
            let id = request.id()?;
            state.database.delete_email_template(id).await?;
            record_activity(&state, &admin, "email_template.delete", "email_template", Some(id), None).await;
            success_with_message(json!({"id": id}), "Vorlage gelöscht")
        }
        "preview" => {
            let template = load_template(&state, request.id()?).await?;
            let vars: Map<String, Value> = request.optional_field("variables")?.unwrap_or_default();
            success(render_template(&template, &vars))
        }
        "save_smtp" => {
            let settings: SmtpSettings = request.field("smtp").or_else(|_| request.parse())?;
            let saved = save_smtp_settings(&state.database, settings).await?;
            record_activity(
                &state,
                &admin,
                "smtp.update",
                "settings",
                None,
                Some(json!({"host": saved.host, "port": saved.port})),
            )
            .await;
            success_with_message(saved, "SMTP-Einstellungen gespeichert")
        }
        other => Err(unknown_action(other)),
    }
}
