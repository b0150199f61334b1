use async_trait::async_trait;
use serde::Serialize;

use super::{decode_jwt, AuthError};

/// The authenticated caller as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub external_user_id: String,
    pub external_org_id: Option<String>,
    pub org_name: Option<String>,
    pub org_role: Option<String>,
}

/// Turns a bearer credential into a principal. Credential verification lives behind this seam.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Principal, AuthError>;
}

/// HS256 tokens signed with a shared secret
pub struct JwtIdentity {
    secret: String,
    leeway_secs: u64,
}

impl JwtIdentity {
    pub fn new(secret: impl Into<String>, leeway_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            leeway_secs,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentity {
    async fn resolve(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = decode_jwt(token, &self.secret, self.leeway_secs)?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".into()));
        }

        // An empty org claim means no organization has been selected
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Ok(Principal {
            external_user_id: claims.sub,
            external_org_id: non_empty(claims.org_id),
            org_name: non_empty(claims.org_name),
            org_role: non_empty(claims.org_role),
        })
    }
}
