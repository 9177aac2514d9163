use axum::extract::State;
use serde_json::Value;
use std::collections::BTreeMap;

use super::request::{ActionRequest, ApiQuery, Selector};
use super::response::{success, success_with_message, ApiResult};
use super::{record_activity, unknown_action};
use crate::auth::CurrentUser;
use crate::database::settings::{validate_setting, InvoiceDesign};
use crate::email::SMTP_SETTINGS_KEY;
use crate::error::AppError;
use crate::state::AppState;

/// Keys only reachable through their own admin endpoint.
fn is_protected(key: &str) -> bool {
    key == SMTP_SETTINGS_KEY
}

fn setting_value(key: &str, value: Value) -> Result<String, AppError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
        Value::Array(_) | Value::Object(_) => Err(AppError::ValidationError(format!(
            "Einstellung '{}' muss ein einfacher Wert sein",
            key
        ))),
    }
}

pub async fn query(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(selector): ApiQuery<Selector>,
) -> ApiResult {
    match selector.action() {
        "list" => {
            let settings: BTreeMap<String, String> = state
                .database
                .list_settings()
                .await?
                .into_iter()
                .filter(|s| !is_protected(&s.key))
                .map(|s| (s.key, s.value))
                .collect();
            success(settings)
        }
        "get" => {
            let key = selector.require_key()?;
            if is_protected(key) {
                return Err(AppError::NotFound(format!("Einstellung {} nicht gefunden", key)));
            }
            let value = state
                .database
                .get_setting(key)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Einstellung {} nicht gefunden", key)))?;
            success(serde_json::json!({ "key": key, "value": value }))
        }
        "invoice_design" => success(state.database.invoice_design().await?),
        other => Err(unknown_action(other)),
    }
}

pub async fn mutate(State(state): State<AppState>, user: CurrentUser, request: ActionRequest) -> ApiResult {
    user.require(&state, "settings.edit").await?;

    match request.action.as_str() {
        "update" => {
            let raw: BTreeMap<String, Value> = request.field("values")?;
            let mut values = BTreeMap::new();
            for (key, value) in raw {
                if is_protected(&key) {
                    return Err(AppError::ValidationError(format!(
                        "Einstellung '{}' kann hier nicht geändert werden",
                        key
                    )));
                }
                let value = setting_value(&key, value)?;
                validate_setting(&key, &value)?;
                values.insert(key, value);
            }
            if values.is_empty() {
                return Err(AppError::missing_field("values"));
            }

            state.database.update_settings(&values).await?;
            let keys: Vec<&String> = values.keys().collect();
            record_activity(
                &state,
                &user,
                "settings.update",
                "settings",
                None,
                Some(serde_json::json!({ "keys": keys })),
            )
            .await;
            success_with_message(values, "Einstellungen gespeichert")
        }
        "save_invoice_design" => {
            let design: InvoiceDesign = match request.optional_field("design")? {
                Some(design) => design,
                None => request.parse()?,
            };
            let design = state.database.save_invoice_design(&design).await?;
            record_activity(&state, &user, "settings.invoice_design", "settings", None, None).await;
            success_with_message(design, "Rechnungsdesign gespeichert")
        }
        other => Err(unknown_action(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setting_value_conversion() {
        assert_eq!(setting_value("a", json!("x")).unwrap(), "x");
        assert_eq!(setting_value("a", json!(19)).unwrap(), "19");
        assert_eq!(setting_value("a", json!(true)).unwrap(), "true");
        assert_eq!(setting_value("a", Value::Null).unwrap(), "");
        assert!(setting_value("a", json!({"b": 1})).is_err());
    }

    #[test]
    fn test_smtp_key_is_protected() {
        assert!(is_protected("smtp"));
        assert!(!is_protected("practice_name"));
    }
}
