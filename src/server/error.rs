use axum::{
    extract::rejection::StringRejection,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::sql::{BuildError, QueryBuilderError, StoreError};

use super::api::{ErrorResponse, ErrorResponseType};

pub enum ServerError {
    NotFound(Uri),
    /// Builder taxonomy errors: the caller sent a bad request.
    BadRequest(QueryBuilderError),
    /// The request body could not be extracted at all.
    InvalidBody(String),
    /// The statement was emitted but the warehouse rejected or failed it.
    Execution(String),
    UncaughtError(String),
}

fn trace_details() -> Option<serde_json::Value> {
    tracing_opentelemetry_instrumentation_sdk::find_current_trace_id()
        .map(|trace_id| json!({ "trace_id": trace_id }))
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(uri) => (
                StatusCode::NOT_FOUND,
                format!("Path not found: {}", uri.path()),
            )
                .into_response(),
            Self::BadRequest(err) => (
                StatusCode::BAD_REQUEST,
                axum::Json(ErrorResponse {
                    details: trace_details(),
                    message: err.to_string(),
                    error_type: ErrorResponseType::InvalidRequest,
                }),
            )
                .into_response(),
            Self::InvalidBody(message) => (
                StatusCode::BAD_REQUEST,
                axum::Json(ErrorResponse {
                    details: trace_details(),
                    message,
                    error_type: ErrorResponseType::InvalidRequest,
                }),
            )
                .into_response(),
            Self::Execution(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(ErrorResponse {
                    details: trace_details(),
                    message: format!("SQL execution error: {}", message),
                    error_type: ErrorResponseType::SqlExecutionError,
                }),
            )
                .into_response(),
            Self::UncaughtError(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(ErrorResponse {
                    details: trace_details(),
                    message,
                    error_type: ErrorResponseType::UncaughtError,
                }),
            )
                .into_response(),
        }
    }
}

impl From<QueryBuilderError> for ServerError {
    fn from(err: QueryBuilderError) -> Self {
        Self::BadRequest(err)
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        Self::UncaughtError(err.to_string())
    }
}

impl From<BuildError> for ServerError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Store(err) => err.into(),
            BuildError::Builder(err) => err.into(),
        }
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Execution(err.to_string())
    }
}

impl From<StringRejection> for ServerError {
    fn from(err: StringRejection) -> Self {
        Self::InvalidBody(err.to_string())
    }
}
