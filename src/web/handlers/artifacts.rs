//! Merged playlist and guide downloads, and the forced merge trigger

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

use crate::errors::MergeError;
use crate::merge::Artifact;
use crate::web::AppState;

pub async fn serve_playlist(State(state): State<AppState>) -> Response {
    serve_artifact(&state, Artifact::Playlist).await
}

pub async fn serve_guide(State(state): State<AppState>) -> Response {
    serve_artifact(&state, Artifact::Guide).await
}

async fn serve_artifact(state: &AppState, artifact: Artifact) -> Response {
    let file = match state.merge.open_artifact(artifact).await {
        Ok(Some(file)) => file,
        Ok(None) => {
            warn!("{:?} requested but not published yet", artifact);
            return (StatusCode::NOT_FOUND, "Not found").into_response();
        }
        Err(e) => {
            error!("Failed to open {:?}: {}", artifact, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let mut headers = HeaderMap::new();
    let content_type = artifact.content_type(state.merge.paths());
    if let Ok(value) = content_type.parse() {
        headers.insert("content-type", value);
    }
    if let Ok(metadata) = file.metadata().await
        && let Ok(value) = metadata.len().to_string().parse()
    {
        headers.insert("content-length", value);
    }

    let body = Body::from_stream(ReaderStream::new(file));
    (StatusCode::OK, headers, body).into_response()
}

/// Force a full merge pass; a second trigger while one is queued is rejected
pub async fn run_merge(State(state): State<AppState>) -> impl IntoResponse {
    match state.merge.force_merge().await {
        Ok(_) => (StatusCode::OK, "OK".to_string()),
        Err(MergeError::Busy) => (StatusCode::CONFLICT, MergeError::Busy.to_string()),
        Err(e) => {
            error!("Forced merge failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
