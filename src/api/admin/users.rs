use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use crate::api::request::{ActionRequest, ApiQuery, Selector};
use crate::api::response::{created, success, success_with_message, ApiResult};
use crate::api::{record_activity, unknown_action};
use crate::auth::password::validate_password;
use crate::auth::AdminUser;
use crate::database::models::User;
use crate::database::users::{UserRecord, ADMIN_ROLE};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct UserInput {
    username: String,
    email: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    role: String,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

impl UserInput {
    async fn into_record(self, state: &AppState, password_required: bool) -> Result<UserRecord, AppError> {
        let password_hash = match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(plain) => {
                validate_password(plain)?;
                Some(state.auth.hash_password(plain).await?)
            }
            None if password_required => return Err(AppError::missing_field("password")),
            None => None,
        };

        Ok(UserRecord {
            username: self.username,
            email: self.email,
            password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            is_active: self.is_active,
        })
    }
}

async fn load_user(state: &AppState, id: i64) -> Result<User, AppError> {
    state
        .database
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("Benutzer", id))
}

/// Refuse a change that would leave no active administrator.
async fn ensure_admin_remains(state: &AppState, target: &User) -> Result<(), AppError> {
    if target.role_name == ADMIN_ROLE
        && target.is_active
        && state.database.count_active_admins().await? <= 1
    {
        return Err(AppError::Conflict(
            "Mindestens ein aktiver Administrator muss erhalten bleiben".to_string(),
        ));
    }
    Ok(())
}

pub async fn query(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiQuery(selector): ApiQuery<Selector>,
) -> ApiResult {
    match selector.action() {
        "list" => success(state.database.list_users().await?),
        "get" => success(load_user(&state, selector.require_id()?).await?),
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, AdminUser(admin): AdminUser, request: ActionRequest) -> ApiResult {
    match request.action.as_str() {
        "create" => {
            let input: UserInput = request.parse()?;
            let record = input.into_record(&state, true).await?;
            let user = state.database.create_user(&record).await?;
            record_activity(
                &state,
                &admin,
                "user.create",
                "user",
                Some(user.id),
                Some(json!({"username": user.username, "role": user.role_name})),
            )
            .await;
            created(user, "Benutzer angelegt")
        }
        "update" => {
            let id = request.id()?;
            let input: UserInput = request.parse()?;
            let existing = load_user(&state, id).await?;
            if input.role != ADMIN_ROLE || !input.is_active {
                if id == admin.id() {
                    return Err(AppError::Conflict(
                        "Sie können sich die eigenen Administratorrechte nicht entziehen".to_string(),
                    ));
                }
                ensure_admin_remains(&state, &existing).await?;
            }
            let record = input.into_record(&state, false).await?;
            let user = state.database.update_user(id, &record).await?;
            record_activity(&state, &admin, "user.update", "user", Some(id), None).await;
            success_with_message(user, "Benutzer gespeichert")
        }
        "toggle_active" => {
            let id = request.id()?;
            let existing = load_user(&state, id).await?;
            let active = request.optional_field::<bool>("is_active")?.unwrap_or(!existing.is_active);
            if !active {
                if id == admin.id() {
                    return Err(AppError::Conflict(
                        "Sie können Ihr eigenes Konto nicht deaktivieren".to_string(),
                    ));
                }
                ensure_admin_remains(&state, &existing).await?;
            }
            let user = state.database.set_user_active(id, active).await?;
            record_activity(
                &state,
                &admin,
                "user.toggle_active",
                "user",
                Some(id),
                Some(json!({"is_active": active})),
            )
            .await;
            let message = if active { "Benutzer aktiviert" } else { "Benutzer deaktiviert" };
            success_with_message(user, message)
        }
        "delete" => {
            let id = request.id()?;
            if id == admin.id() {
                return Err(AppError::Conflict(
                    "Sie können Ihr eigenes Konto nicht löschen".to_string(),
                ));
            }
            let existing = load_user(&state, id).await?;
            ensure_admin_remains(&state, &existing).await?;
            state.database.delete_user(id).await?;
            record_activity(
                &state,
                &admin,
                "user.delete",
                "user",
                Some(id),
                Some(json!({"username": existing.username})),
            )
            .await;
            success_with_message(json!({"id": id}), "Benutzer gelöscht")
        }
        other => Err(unknown_action(other)),
    }
}
