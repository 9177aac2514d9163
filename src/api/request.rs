//! Request extractors for the `action`-dispatched endpoints.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::AppError;

/// `Query<T>` with failures reported in the error envelope.
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::ValidationError(e.body_text()))?;
        Ok(ApiQuery(value))
    }
}

/// `action` and `id` of a GET request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selector {
    pub action: Option<String>,
    pub id: Option<i64>,
    pub key: Option<String>,
}

impl Selector {
    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or("list")
    }

    pub fn require_id(&self) -> Result<i64, AppError> {
        self.id.ok_or_else(|| AppError::missing_field("id"))
    }

    pub fn require_key(&self) -> Result<&str, AppError> {
        self.key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::missing_field("key"))
    }
}

/// A POST body with its `action`, taken from the query string or the body.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub action: String,
    pub body: Map<String, Value>,
}

#[async_trait]
impl<S> FromRequest<S> for ActionRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let query_action = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(params)| params.get("action").cloned());

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::ValidationError(e.body_text()))?;
        let body = parse_body(&bytes)?;

        ActionRequest::from_parts(query_action, body)
    }
}

pub(crate) fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::ValidationError(
            "Anfrageinhalt muss ein JSON-Objekt sein".to_string(),
        )),
    }
}

/// Body of an endpoint with a single operation. `action` may be omitted
/// but must match when given.
#[derive(Debug, Clone)]
pub struct SingleAction(pub Map<String, Value>);

impl SingleAction {
    pub fn expect(self, action: &str) -> Result<Map<String, Value>, AppError> {
        match self.0.get("action").and_then(Value::as_str) {
            Some(given) if given != action => Err(AppError::UnknownAction(given.to_string())),
            _ => Ok(self.0),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for SingleAction
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::ValidationError(e.body_text()))?;
        Ok(SingleAction(parse_body(&bytes)?))
    }
}

impl ActionRequest {
    pub fn from_parts(query_action: Option<String>, body: Map<String, Value>) -> Result<Self, AppError> {
        let action = query_action
            .or_else(|| body.get("action").and_then(Value::as_str).map(str::to_string))
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| AppError::missing_field("action"))?;
        Ok(Self { action, body })
    }

    /// Deserialize the whole body into a typed input.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        Ok(serde_json::from_value(Value::Object(self.body.clone()))?)
    }

    /// Deserialize a single required field.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<T, AppError> {
        match self.body.get(name) {
            None | Some(Value::Null) => Err(AppError::missing_field(name)),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                AppError::ValidationError(format!("Ungültiger Wert für '{}': {}", name, e))
            }),
        }
    }

    pub fn optional_field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AppError> {
        match self.body.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.field(name).map(Some),
        }
    }

    /// The record id, accepted as a number or a numeric string.
    pub fn id(&self) -> Result<i64, AppError> {
        match self.body.get("id") {
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| AppError::ValidationError("Ungültige ID".to_string())),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| AppError::ValidationError(format!("Ungültige ID: {}", s))),
            _ => Err(AppError::missing_field("id")),
        }
    }
}
