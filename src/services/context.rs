use serde::Serialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::Tenant;
use crate::database::Scope;
use crate::resources::ResourceSpec;

/// Resolved once per request and passed explicitly to every tenant-scoped call
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    pub principal: Principal,
    pub tenant: Tenant,
}

impl RequestContext {
    pub fn new(principal: Principal, tenant: Tenant) -> Self {
        Self { principal, tenant }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant.id
    }

    pub fn user_id(&self) -> &str {
        &self.principal.external_user_id
    }

    /// The scope a query on `spec` runs under for this caller
    pub fn scope_for(&self, spec: &ResourceSpec) -> Scope {
        if spec.is_tenant_owned() {
            Scope::Tenant(self.tenant.id)
        } else {
            Scope::Shared
        }
    }
}
