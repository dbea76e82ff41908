//! Read-only view of configured sources and their recent runs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::error;

use crate::database::repositories::SourceSeaOrmRepository;
use crate::models::{ByteRange, RunResult, Source, SourceKind, SourceRole};
use crate::utils::UrlUtils;
use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub id: i32,
    pub role: SourceRole,
    pub label: String,
    pub kind: SourceKind,
    pub path: String,
    pub rank: i32,
    pub enabled: bool,
    pub results: Vec<RunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_range: Option<ByteRange>,
}

impl From<Source> for SourceStatus {
    fn from(source: Source) -> Self {
        let guide_range = (source.role == SourceRole::Guide).then_some(source.range);
        Self {
            id: source.id,
            role: source.role,
            label: UrlUtils::obfuscate_credentials(&source.label),
            kind: source.kind,
            path: UrlUtils::obfuscate_credentials(&source.path),
            rank: source.rank,
            enabled: source.enabled,
            results: source.history.iter().cloned().collect(),
            guide_range,
        }
    }
}

pub async fn list_sources(State(state): State<AppState>) -> impl IntoResponse {
    let repo = SourceSeaOrmRepository::new(state.database.connection());
    match repo.find_all().await {
        Ok(sources) => {
            let statuses: Vec<SourceStatus> = sources.into_iter().map(SourceStatus::from).collect();
            (StatusCode::OK, Json(statuses)).into_response()
        }
        Err(e) => {
            error!("Failed to list sources: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
