use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::database::models::Tenant;
use crate::database::{DatabaseError, Store};

/// Maps external organization ids to tenants, creating them on first use
pub struct TenantDirectory<'a> {
    store: &'a dyn Store,
    placeholder_name: &'a str,
}

impl<'a> TenantDirectory<'a> {
    pub fn new(store: &'a dyn Store, placeholder_name: &'a str) -> Self {
        Self {
            store,
            placeholder_name,
        }
    }

    /// Looks up the tenant bound to `external_org_id`, creating it when unseen.
    /// `display_name` names a newly created tenant; the placeholder is used otherwise.
    pub async fn resolve(&self, external_org_id: &str, display_name: Option<&str>) -> ServiceResult<Tenant> {
        if let Some(tenant) = self.store.tenant_by_external_org(external_org_id).await? {
            debug!("Resolved organization {} to tenant {}", external_org_id, tenant.id);
            return Ok(tenant);
        }

        let name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.placeholder_name);

        match self.store.insert_tenant(Some(external_org_id), name).await {
            Ok(tenant) => {
                info!("Created tenant {} ({}) for organization {}", tenant.id, tenant.name, external_org_id);
                Ok(tenant)
            }
            Err(DatabaseError::UniqueViolation(_)) => {
                // A concurrent first request created it between our read and insert
                debug!("Tenant for organization {} created concurrently, re-reading", external_org_id);
                self.store
                    .tenant_by_external_org(external_org_id)
                    .await?
                    .ok_or_else(|| ServiceError::Conflict(format!("Organization {external_org_id} was rebound concurrently")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sets or clears a tenant's external organization binding
    pub async fn bind(&self, tenant_id: Uuid, external_org_id: Option<&str>) -> ServiceResult<Tenant> {
        match self.store.set_tenant_binding(tenant_id, external_org_id).await {
            Ok(Some(tenant)) => {
                info!("Tenant {} bound to {:?}", tenant.id, tenant.external_org_id);
                Ok(tenant)
            }
            Ok(None) => Err(ServiceError::NotFound("tenant not found".into())),
            Err(DatabaseError::UniqueViolation(_)) => {
                warn!("Refused to bind tenant {} to {:?}: already bound elsewhere", tenant_id, external_org_id);
                Err(ServiceError::Conflict(format!(
                    "Organization {} is already bound to another tenant",
                    external_org_id.unwrap_or_default()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn rename(&self, tenant_id: Uuid, name: &str) -> ServiceResult<Tenant> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid_field("name", "must not be empty"));
        }
        self.store
            .rename_tenant(tenant_id, name)
            .await?
            .ok_or_else(|| ServiceError::NotFound("tenant not found".into()))
    }

    pub async fn get(&self, tenant_id: Uuid) -> ServiceResult<Tenant> {
        self.store
            .tenant_by_id(tenant_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("tenant not found".into()))
    }

    pub async fn list(&self) -> ServiceResult<Vec<Tenant>> {
        Ok(self.store.list_tenants().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    #[tokio::test]
    async fn resolve_creates_once() {
        let store = MemoryStore::new();
        let directory = TenantDirectory::new(&store, "New School");

        let first = directory.resolve("org_1", None).await.unwrap();
        let second = directory.resolve("org_1", Some("ignored")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "New School");
        assert_eq!(directory.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_uses_the_organization_name() {
        let store = MemoryStore::new();
        let directory = TenantDirectory::new(&store, "New School");
        let tenant = directory.resolve("org_1", Some(" Riverside ")).await.unwrap();
        assert_eq!(tenant.name, "Riverside");
    }

    #[tokio::test]
    async fn concurrent_first_use_yields_one_tenant() {
        let store = MemoryStore::new();
        let a = TenantDirectory::new(&store, "x");
        let b = TenantDirectory::new(&store, "x");
        let (left, right) = tokio::join!(a.resolve("org_1", None), b.resolve("org_1", None));
        assert_eq!(left.unwrap().id, right.unwrap().id);
        assert_eq!(store.list_tenants().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn binding_a_taken_org_conflicts() {
        let store = MemoryStore::new();
        let directory = TenantDirectory::new(&store, "x");
        directory.resolve("org_1", None).await.unwrap();
        let other = directory.resolve("org_2", None).await.unwrap();

        assert!(matches!(
            directory.bind(other.id, Some("org_1")).await,
            Err(ServiceError::Conflict(_))
        ));
        let unbound = directory.bind(other.id, None).await.unwrap();
        assert_eq!(unbound.external_org_id, None);
        assert!(matches!(
            directory.bind(Uuid::new_v4(), None).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rename_rejects_blank_names() {
        let store = MemoryStore::new();
        let directory = TenantDirectory::new(&store, "x");
        let tenant = directory.resolve("org_1", None).await.unwrap();
        assert!(matches!(directory.rename(tenant.id, "  ").await, Err(ServiceError::Invalid { .. })));
        assert_eq!(directory.rename(tenant.id, "Hilltop").await.unwrap().name, "Hilltop");
    }
}
