pub mod api;

use std::sync::Arc;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};
use axum_tracing_opentelemetry::middleware::OtelAxumLayer;
use sqlx::PgPool;

pub mod client;
pub mod config;
pub mod error;
mod routes;
use self::routes::*;

use crate::sql::DefinitionStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<dyn DefinitionStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query/:query_id", post(post_query))
        .route("/query/:query_id/sql", post(post_sql))
        .route("/health", get(get_health))
        .fallback(not_found)
        .layer(OtelAxumLayer::default())
        .with_state(state)
}

async fn not_found(uri: Uri) -> error::ServerError {
    error::ServerError::NotFound(uri)
}
