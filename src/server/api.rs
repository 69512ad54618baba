use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub details: Option<serde_json::Value>,
    /// Error message
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ErrorResponseType,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum ErrorResponseType {
    #[serde(rename = "invalid-request")]
    InvalidRequest,
    #[serde(rename = "sql-execution-error")]
    SqlExecutionError,
    #[serde(rename = "uncaught-error")]
    UncaughtError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    /// The rows produced by the report query
    pub rows: Vec<serde_json::Value>,
    /// How many rows came back
    pub row_count: usize,
}

/// Dry-run response: the statement the builder would execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlResponse {
    pub sql: String,
    pub wrap_json: bool,
}
