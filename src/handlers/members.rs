// handlers/members.rs - identity views and first-sight role registration

use axum::{extract::State, Extension};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::Principal;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::services::{MemberRole, Membership, RequestContext, SyncOutcome, Whoami};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SyncBody {
    role: MemberRole,
    #[serde(flatten)]
    profile: Map<String, Value>,
}

/// GET /api/principal - the token's identity, before any tenant resolution
pub async fn principal(Extension(principal): Extension<Principal>) -> ApiResult<Principal> {
    Ok(ApiResponse::success(principal))
}

/// GET /api/me
pub async fn me(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> ApiResult<Whoami> {
    let accessor = state.accessor();
    let whoami = Membership::new(&accessor, &state.config.security.coordinator_org_role)
        .whoami(&ctx)
        .await?;
    Ok(ApiResponse::success(whoami))
}

/// POST /api/members/sync - 201 when the role row was created, 200 when it existed
pub async fn sync(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: JsonBody,
) -> ApiResult<SyncOutcome> {
    let SyncBody { role, profile } = body.parse()?;

    let accessor = state.accessor();
    let outcome = Membership::new(&accessor, &state.config.security.coordinator_org_role)
        .sync(&ctx, role, profile)
        .await?;
    if outcome.created {
        Ok(ApiResponse::created(outcome))
    } else {
        Ok(ApiResponse::success(outcome))
    }
}
