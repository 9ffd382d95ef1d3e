use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use shared_types::{
    ConfigItem, CreateConfigRequest, ResolvedConfig, UpdateConfigRequest, VersionRecord,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ListParams, PullParams},
    error::{ApiError, ApiResult},
    state::AppState,
};

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid config id: {raw}")))
}

/// POST /configs
#[instrument(skip(state, payload))]
pub async fn create_config(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateConfigRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ConfigItem>)> {
    let Json(request) = payload?;
    let item = state.mutations.create_config(request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /configs
/// Optional `app_id` / `namespace` filters, `page` / `size` window
#[instrument(skip(state, params))]
pub async fn list_configs(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<ConfigItem>>> {
    let Query(params) = params?;
    let items = state
        .mutations
        .list_configs(&params.filter(), params.pagination())
        .await?;
    Ok(Json(items))
}

/// GET /configs/:id
#[instrument(skip(state))]
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConfigItem>> {
    let id = parse_id(&id)?;
    Ok(Json(state.mutations.get_config(id).await?))
}

/// PUT /configs/:id
#[instrument(skip(state, payload))]
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateConfigRequest>, JsonRejection>,
) -> ApiResult<Json<ConfigItem>> {
    let id = parse_id(&id)?;
    let Json(request) = payload?;
    Ok(Json(state.mutations.update_config(id, request).await?))
}

/// DELETE /configs/:id
#[instrument(skip(state))]
pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    state.mutations.delete_config(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /configs/pull
/// Resolves the active value for one key, optionally for a client context
#[instrument(skip(state, params))]
pub async fn pull_config(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PullParams>, QueryRejection>,
) -> ApiResult<Json<ResolvedConfig>> {
    let Query(params) = params?;
    let key = params.config_key();
    let context = params.context();
    Ok(Json(state.pulls.pull(&key, context.as_ref()).await?))
}

/// GET /configs/:id/versions
/// Version history, newest first
#[instrument(skip(state))]
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<VersionRecord>>> {
    let id = parse_id(&id)?;
    Ok(Json(state.mutations.history(id).await?))
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.cache.stats();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "config-center",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "cache": stats,
    }))
}
