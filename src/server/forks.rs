//! Fork lifecycle routes: create, edit, merge, unmerge, export.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::errors::ApiError;
use crate::forks::ForkRef;
use crate::recipe::{ForkDetail, ForkInput};

use super::recipes::HistoryQuery;
use super::AppState;

#[derive(Deserialize, Default)]
pub struct MergeRequest {
    #[serde(default)]
    note: String,
}

#[derive(Deserialize, Default)]
pub struct FailRequest {
    #[serde(default)]
    reason: String,
}

/// `POST /api/recipes/{slug}/forks`
pub async fn create_fork(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(input): Json<ForkInput>,
) -> Result<(StatusCode, Json<ForkRef>), ApiError> {
    let fork = state.forks.create_fork(&slug, &input).await?;
    Ok((StatusCode::CREATED, Json(fork)))
}

/// `GET /api/recipes/{slug}/forks/{fork}`
pub async fn get_fork(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
) -> Result<Json<ForkDetail>, ApiError> {
    Ok(Json(state.forks.get_fork(&slug, &fork)?))
}

/// `PUT /api/recipes/{slug}/forks/{fork}`
pub async fn update_fork(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
    Json(input): Json<ForkInput>,
) -> Result<Json<ForkRef>, ApiError> {
    Ok(Json(state.forks.update_fork(&slug, &fork, &input).await?))
}

/// `DELETE /api/recipes/{slug}/forks/{fork}`
pub async fn delete_fork(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.forks.delete_fork(&slug, &fork).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/recipes/{slug}/forks/{fork}/merge`
pub async fn merge_fork(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
    body: Option<Json<MergeRequest>>,
) -> Result<Json<ForkRef>, ApiError> {
    let note = body.map(|Json(b)| b.note).unwrap_or_default();
    Ok(Json(state.forks.merge_fork(&slug, &fork, &note).await?))
}

/// `POST /api/recipes/{slug}/forks/{fork}/unmerge`
pub async fn unmerge_fork(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
) -> Result<Json<ForkRef>, ApiError> {
    Ok(Json(state.forks.unmerge_fork(&slug, &fork).await?))
}

/// `POST /api/recipes/{slug}/forks/{fork}/fail`
pub async fn fail_fork(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
    body: Option<Json<FailRequest>>,
) -> Result<StatusCode, ApiError> {
    let reason = body.map(|Json(b)| b.reason).unwrap_or_default();
    state.forks.fail_fork(&slug, &fork, &reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/recipes/{slug}/forks/{fork}/unfail`
pub async fn unfail_fork(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.forks.unfail_fork(&slug, &fork).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/recipes/{slug}/forks/{fork}/export` — the fork merged over
/// its base as a standalone downloadable markdown document.
pub async fn export_fork(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let export = state.forks.export_fork(&slug, &fork)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.markdown,
    ))
}

/// `GET /api/recipes/{slug}/forks/{fork}/history`
pub async fn fork_history(
    State(state): State<AppState>,
    Path((slug, fork)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<crate::git::LogEntry>>, ApiError> {
    Ok(Json(state.forks.fork_history(&slug, &fork, query.content)?))
}
