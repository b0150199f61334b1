// handlers/tenant.rs - the caller's school

use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::database::models::Tenant;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::services::role_gate::require_coordinator;
use crate::services::RequestContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct RenameBody {
    name: String,
}

/// GET /api/tenant
pub async fn show(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> ApiResult<Tenant> {
    let tenant = state.tenants().get(ctx.tenant_id()).await?;
    Ok(ApiResponse::success(tenant))
}

/// PATCH /api/tenant - coordinators only
pub async fn rename(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: JsonBody,
) -> ApiResult<Tenant> {
    let RenameBody { name } = body.parse()?;
    require_coordinator(state.store.as_ref(), &ctx).await?;

    let tenant = state.tenants().rename(ctx.tenant_id(), &name).await?;
    Ok(ApiResponse::success(tenant))
}
