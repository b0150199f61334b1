use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::Principal;
use crate::error::ApiError;
use crate::services::{RequestContext, ServiceError};
use crate::state::AppState;

/// Maps the principal's organization to a tenant, creating it on first sight,
/// and stores the `RequestContext` for the handlers. Runs after `require_principal`.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or(ServiceError::Unauthenticated)?;
    let org = principal
        .external_org_id
        .as_deref()
        .ok_or(ServiceError::NoTenantSelected)?;

    let tenant = state.tenants().resolve(org, principal.org_name.as_deref()).await?;

    request.extensions_mut().insert(RequestContext::new(principal, tenant));
    Ok(next.run(request).await)
}
