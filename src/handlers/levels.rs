// handlers/levels.rs - level assignment for trainers and batches

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::LevelAssignment;
use crate::middleware::{parse_id, ApiResponse, ApiResult, JsonBody, QueryParams};
use crate::resources::ResourceKind;
use crate::services::{LevelAssignments, RequestContext, SubjectLevels};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct AssignBody {
    level_id: Uuid,
}

async fn levels(state: AppState, ctx: RequestContext, subject: ResourceKind, id: String, params: QueryParams) -> ApiResult<SubjectLevels> {
    let id = parse_id("id", &id)?;
    let history = params.flag("history")?;

    let accessor = state.accessor();
    let levels = LevelAssignments::new(state.store.as_ref(), &accessor)
        .levels(&ctx, subject, id, history)
        .await?;
    Ok(ApiResponse::success(levels))
}

async fn assign(state: AppState, ctx: RequestContext, subject: ResourceKind, id: String, body: JsonBody) -> ApiResult<LevelAssignment> {
    let id = parse_id("id", &id)?;
    let AssignBody { level_id } = body.parse()?;

    let accessor = state.accessor();
    let row = LevelAssignments::new(state.store.as_ref(), &accessor)
        .assign(&ctx, subject, id, level_id)
        .await?;
    Ok(ApiResponse::created(row))
}

/// Responds 200 whether or not an assignment existed; `assignment` is null when none did
async fn unassign(state: AppState, ctx: RequestContext, subject: ResourceKind, id: String, params: QueryParams) -> ApiResult<Value> {
    let id = parse_id("id", &id)?;
    let level_id = params.uuid("level_id")?;

    let accessor = state.accessor();
    let row = LevelAssignments::new(state.store.as_ref(), &accessor)
        .unassign(&ctx, subject, id, level_id)
        .await?;
    Ok(ApiResponse::success(json!({
        "level_id": level_id,
        "assignment": row,
    })))
}

/// GET /api/trainers/:id/levels[?history=true]
pub async fn trainer_levels(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    params: QueryParams,
) -> ApiResult<SubjectLevels> {
    levels(state, ctx, ResourceKind::Trainers, id, params).await
}

/// POST /api/trainers/:id/levels
pub async fn trainer_assign(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    body: JsonBody,
) -> ApiResult<LevelAssignment> {
    assign(state, ctx, ResourceKind::Trainers, id, body).await
}

/// DELETE /api/trainers/:id/levels?level_id=
pub async fn trainer_unassign(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    params: QueryParams,
) -> ApiResult<Value> {
    unassign(state, ctx, ResourceKind::Trainers, id, params).await
}

/// GET /api/batches/:id/levels[?history=true]
pub async fn batch_levels(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    params: QueryParams,
) -> ApiResult<SubjectLevels> {
    levels(state, ctx, ResourceKind::Batches, id, params).await
}

/// POST /api/batches/:id/levels
pub async fn batch_assign(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    body: JsonBody,
) -> ApiResult<LevelAssignment> {
    assign(state, ctx, ResourceKind::Batches, id, body).await
}

/// DELETE /api/batches/:id/levels?level_id=
pub async fn batch_unassign(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    params: QueryParams,
) -> ApiResult<Value> {
    unassign(state, ctx, ResourceKind::Batches, id, params).await
}
