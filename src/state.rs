use std::sync::Arc;

use crate::auth::{IdentityProvider, JwtIdentity};
use crate::config::AppConfig;
use crate::database::Store;
use crate::services::{GatePolicy, PolicyError, ResourceAccessor, TenantDirectory};

/// Shared handles every request handler works from
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub policy: Arc<GatePolicy>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wires the JWT identity provider and the gate policy from configuration.
    /// A malformed gate override is a startup error.
    pub fn from_config(config: AppConfig, store: Arc<dyn Store>) -> Result<Self, PolicyError> {
        let policy = GatePolicy::from_overrides(&config.access.gate_overrides)?;
        let identity = JwtIdentity::new(config.security.jwt_secret.clone(), config.security.jwt_leeway_secs);
        Ok(Self {
            store,
            identity: Arc::new(identity),
            policy: Arc::new(policy),
            config: Arc::new(config),
        })
    }

    pub fn accessor(&self) -> ResourceAccessor<'_> {
        ResourceAccessor::new(self.store.as_ref(), &self.policy, &self.config.api)
    }

    pub fn tenants(&self) -> TenantDirectory<'_> {
        TenantDirectory::new(self.store.as_ref(), &self.config.tenancy.placeholder_name)
    }
}
