use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::{info_span, Instrument};

use crate::{
    server::{api::ReportResponse, client::execute_report_query, error::ServerError, AppState},
    sql::build_query_from_id,
};

#[derive(Debug, Deserialize)]
pub struct ExecuteOptions {
    /// `wrap=false` requests raw row output; rejected for wrap-only definitions
    pub wrap: Option<bool>,
}

impl ExecuteOptions {
    pub fn unwrapped(&self) -> bool {
        self.wrap == Some(false)
    }
}

#[axum_macros::debug_handler]
pub async fn post_query(
    State(state): State<AppState>,
    Path(query_id): Path<String>,
    Query(options): Query<ExecuteOptions>,
    WithRejection(params_json, _): WithRejection<String, ServerError>,
) -> Result<Json<ReportResponse>, ServerError> {
    // an absent body means "no parameters"; the builder itself stays strict
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

    let response = execute_report_query(&state.pool, &build)
        .instrument(info_span!("execute_query"))
        .await?;

    Ok(Json(response))
}
