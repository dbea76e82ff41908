//! Health check HTTP handler

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::database::repositories::AppStateSeaOrmRepository;
use crate::web::AppState;

/// Reports store connectivity and when the last merge started
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.database.connection.ping().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "database": e.to_string() })),
        );
    }

    let last_run = AppStateSeaOrmRepository::new(state.database.connection())
        .last_run()
        .await
        .ok()
        .flatten();

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "database": "connected",
            "last_run": last_run,
            "artifacts_present": state.merge.paths().artifacts_present(),
        })),
    )
}
