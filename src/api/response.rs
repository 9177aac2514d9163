use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::error::AppError;

/// Success envelope shared by every endpoint. Errors use the same shape
/// with `"status": "error"` (see [`AppError`]).
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "success",
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            status: "success",
            data,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

pub type ApiResult = Result<Response, AppError>;

pub fn success<T: Serialize>(data: T) -> ApiResult {
    Ok(ApiResponse::ok(data).into_response())
}

pub fn success_with_message<T: Serialize>(data: T, message: impl Into<String>) -> ApiResult {
    Ok(ApiResponse::with_message(data, message).into_response())
}

pub fn created<T: Serialize>(data: T, message: impl Into<String>) -> ApiResult {
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(data, message)),
    )
        .into_response())
}
