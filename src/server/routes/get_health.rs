use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::server::{client::ping, AppState};

#[axum_macros::debug_handler]
pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    if ping(&state.pool).await.is_ok() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::GATEWAY_TIMEOUT
    }
}
