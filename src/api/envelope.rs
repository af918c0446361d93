//! The response envelope (spec §6): every response carries `success`,
//! a `timestamp`, and either `data`/`message` or `error`/`details`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::domain::errors::DomainError;

#[derive(Debug, Serialize)]
struct SuccessEnvelope {
    success: bool,
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
    timestamp: i64,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A 200 success envelope wrapping `data`.
pub fn success(data: Value) -> Response {
    success_with(StatusCode::OK, data, None)
}

/// A success envelope with an explicit status code (e.g. 201 on creation)
/// and an optional human-readable `message`.
pub fn success_with(status: StatusCode, data: Value, message: Option<String>) -> Response {
    (status, Json(SuccessEnvelope { success: true, data, message, timestamp: now() })).into_response()
}

/// Map a [`DomainError`] to its HTTP status (spec §7) and error envelope.
pub fn error(err: DomainError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let details = err.details();
    let body = ErrorEnvelope { success: false, error: err.to_string(), details, timestamp: now() };
    (status, Json(body)).into_response()
}
