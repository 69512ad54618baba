use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    server::{api::SqlResponse, error::ServerError, AppState},
    sql::build_query_from_id,
};

use super::post_query::ExecuteOptions;

/// Dry-run: build the statement without executing it. The dashboard's
/// diagnostics use this to inspect what a definition would run.
#[axum_macros::debug_handler]
pub async fn post_sql(
    State(state): State<AppState>,
    Path(query_id): Path<String>,
    Query(options): Query<ExecuteOptions>,
    WithRejection(params_json, _): WithRejection<String, ServerError>,
) -> Result<Json<SqlResponse>, ServerError> {
    let params_json = if params_json.trim().is_empty() {
        "{}".to_owned()
    } else {
        params_json
    };

    let build = build_query_from_id(
        state.store.as_ref(),
        &query_id,
        &params_json,
        options.unwrapped(),
    )
    .await?;

    Ok(Json(SqlResponse {
        sql: build.sql,
        wrap_json: build.wrap_json,
    }))
}
