// handlers/data.rs - generic tenant-scoped CRUD over /api/data/:resource

use axum::{
    extract::{Path, State},
    Extension,
};
use uuid::Uuid;

use crate::database::Record;
use crate::error::ApiError;
use crate::middleware::{parse_id, ApiResponse, ApiResult, JsonBody, QueryParams};
use crate::resources::ResourceKind;
use crate::services::{Deleted, RequestContext};
use crate::state::AppState;

fn resource(segment: &str) -> Result<ResourceKind, ApiError> {
    ResourceKind::from_path(segment).ok_or_else(|| ApiError::not_found(format!("Unknown resource '{}'", segment)))
}

fn record_path(resource_segment: &str, id: &str) -> Result<(ResourceKind, Uuid), ApiError> {
    Ok((resource(resource_segment)?, parse_id("id", id)?))
}

/// GET /api/data/:resource - list, with `limit`, `offset` and column filters
pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(segment): Path<String>,
    QueryParams(params): QueryParams,
) -> ApiResult<Vec<Record>> {
    let kind = resource(&segment)?;
    let rows = state.accessor().list_for_tenant(&ctx, kind, &params).await?;
    Ok(ApiResponse::success(rows))
}

/// POST /api/data/:resource
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(segment): Path<String>,
    JsonBody(payload): JsonBody,
) -> ApiResult<Record> {
    let kind = resource(&segment)?;
    let row = state.accessor().create_for_tenant(&ctx, kind, payload).await?;
    Ok(ApiResponse::created(row))
}

/// GET /api/data/:resource/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((segment, id)): Path<(String, String)>,
) -> ApiResult<Record> {
    let (kind, id) = record_path(&segment, &id)?;
    let row = state.accessor().get_if_owned(&ctx, kind, id).await?;
    Ok(ApiResponse::success(row))
}

/// PATCH /api/data/:resource/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((segment, id)): Path<(String, String)>,
    JsonBody(patch): JsonBody,
) -> ApiResult<Record> {
    let (kind, id) = record_path(&segment, &id)?;
    let row = state.accessor().update_if_owned(&ctx, kind, id, patch).await?;
    Ok(ApiResponse::success(row))
}

/// DELETE /api/data/:resource/:id
pub async fn remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((segment, id)): Path<(String, String)>,
) -> ApiResult<Deleted> {
    let (kind, id) = record_path(&segment, &id)?;
    let deleted = state.accessor().delete_if_owned(&ctx, kind, id).await?;
    Ok(ApiResponse::success(deleted))
}

/// PATCH /api/data/:resource?id=
pub async fn update_by_query(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(segment): Path<String>,
    params: QueryParams,
    JsonBody(patch): JsonBody,
) -> ApiResult<Record> {
    let kind = resource(&segment)?;
    let id = params.uuid("id")?;
    let row = state.accessor().update_if_owned(&ctx, kind, id, patch).await?;
    Ok(ApiResponse::success(row))
}

/// DELETE /api/data/:resource?id=
pub async fn remove_by_query(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(segment): Path<String>,
    params: QueryParams,
) -> ApiResult<Deleted> {
    let kind = resource(&segment)?;
    let id = params.uuid("id")?;
    let deleted = state.accessor().delete_if_owned(&ctx, kind, id).await?;
    Ok(ApiResponse::success(deleted))
}
