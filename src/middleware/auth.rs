use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Validates the bearer token through the identity provider and stores the
/// resulting `Principal` in the request extensions
pub async fn require_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| ApiError::unauthorized("Invalid Authorization header format")))
        .transpose()?;
    // Owned, so no borrow of the request is held across the await
    let token = bearer_token(header)?.to_string();

    let principal = state.identity.resolve(&token).await?;
    debug!(
        "Authenticated {} (org {:?})",
        principal.external_user_id, principal.external_org_id
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
