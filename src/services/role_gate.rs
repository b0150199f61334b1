//! Who may mutate what inside a tenant.
//!
//! Each (resource, mutation) pair maps to one [`Gate`]. The defaults reproduce
//! the behaviour the product has always had; `ACCESS_GATES` overrides single
//! entries without code changes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::warn;

use super::context::RequestContext;
use super::error::{ServiceError, ServiceResult};
use crate::database::{Filter, Record, Scope, ScopedQuery, Store};
use crate::resources::{ResourceKind, COORDINATORS, IDENTITY_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Open,
    Coordinator,
    /// The row's external user id must be the caller's
    SelfService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mutation::Create => "create",
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        })
    }
}

impl FromStr for Mutation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Mutation::Create),
            "update" => Ok(Mutation::Update),
            "delete" => Ok(Mutation::Delete),
            _ => Err(()),
        }
    }
}

impl FromStr for Gate {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Gate::Open),
            "coordinator" => Ok(Gate::Coordinator),
            "self" => Ok(Gate::SelfService),
            _ => Err(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("malformed gate override '{0}', expected resource:mutation=gate")]
    Malformed(String),

    #[error("unknown resource in gate override: {0}")]
    UnknownResource(String),

    #[error("unknown mutation in gate override: {0}")]
    UnknownMutation(String),

    #[error("unknown gate in gate override: {0} (open, coordinator or self)")]
    UnknownGate(String),

    #[error("self gate needs a resource with an {IDENTITY_COLUMN} column: {0}")]
    SelfServiceUnsupported(String),

    #[error("gate cannot be overridden: {0}")]
    Locked(String),
}

const COORDINATOR_GATED: [ResourceKind; 8] = [
    ResourceKind::Assignments,
    ResourceKind::Announcements,
    ResourceKind::Levels,
    ResourceKind::Courses,
    ResourceKind::Sections,
    ResourceKind::Lessons,
    ResourceKind::Quizzes,
    ResourceKind::CourseAssignments,
];

#[derive(Debug, Clone)]
pub struct GatePolicy {
    gates: HashMap<(ResourceKind, Mutation), Gate>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        let mut gates = HashMap::new();
        for kind in COORDINATOR_GATED {
            for mutation in [Mutation::Create, Mutation::Update, Mutation::Delete] {
                gates.insert((kind, mutation), Gate::Coordinator);
            }
        }
        // Coordinator rows come from membership sync; the data API only lets a coordinator edit their own
        gates.insert((ResourceKind::Coordinators, Mutation::Create), Gate::Coordinator);
        gates.insert((ResourceKind::Coordinators, Mutation::Update), Gate::SelfService);
        gates.insert((ResourceKind::Coordinators, Mutation::Delete), Gate::Coordinator);
        Self { gates }
    }
}

impl GatePolicy {
    /// Defaults with `resource:mutation=gate` overrides applied in order
    pub fn from_overrides(overrides: &[String]) -> Result<Self, PolicyError> {
        let mut policy = Self::default();
        for entry in overrides.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            let (target, gate) = entry
                .split_once('=')
                .ok_or_else(|| PolicyError::Malformed(entry.to_string()))?;
            let (resource, mutation) = target
                .split_once(':')
                .ok_or_else(|| PolicyError::Malformed(entry.to_string()))?;

            let kind = ResourceKind::from_path(resource.trim())
                .ok_or_else(|| PolicyError::UnknownResource(resource.to_string()))?;
            let mutation = mutation
                .trim()
                .parse::<Mutation>()
                .map_err(|_| PolicyError::UnknownMutation(mutation.to_string()))?;
            let gate = gate.trim().parse::<Gate>().map_err(|_| PolicyError::UnknownGate(gate.to_string()))?;

            if (kind, mutation) == (ResourceKind::Coordinators, Mutation::Create) && gate != Gate::Coordinator {
                return Err(PolicyError::Locked(entry.to_string()));
            }
            if gate == Gate::SelfService && !kind.spec().has_identity_column() {
                return Err(PolicyError::SelfServiceUnsupported(kind.to_string()));
            }
            policy.gates.insert((kind, mutation), gate);
        }
        Ok(policy)
    }

    pub fn gate(&self, kind: ResourceKind, mutation: Mutation) -> Gate {
        self.gates.get(&(kind, mutation)).copied().unwrap_or(Gate::Open)
    }

    /// Applies the gate for a mutation. `existing` is the target row for update and delete.
    pub async fn enforce(
        &self,
        store: &dyn Store,
        ctx: &RequestContext,
        kind: ResourceKind,
        mutation: Mutation,
        existing: Option<&Record>,
    ) -> ServiceResult<()> {
        match self.gate(kind, mutation) {
            Gate::Open => Ok(()),
            Gate::Coordinator => require_coordinator(store, ctx).await,
            // Creation stamps the caller's id, so only existing rows need checking
            Gate::SelfService => match existing.and_then(|row| row.get(IDENTITY_COLUMN)) {
                None if mutation == Mutation::Create => Ok(()),
                Some(owner) if owner.as_str() == Some(ctx.user_id()) => Ok(()),
                _ => {
                    warn!("User {} refused {} on another user's {}", ctx.user_id(), mutation, kind.noun());
                    Err(ServiceError::Forbidden(format!("You may only {} your own {}", mutation, kind.noun())))
                }
            },
        }
    }
}

/// Whether the caller holds the tenant's coordinator record
pub async fn is_coordinator(store: &dyn Store, ctx: &RequestContext) -> ServiceResult<bool> {
    let mut query = ScopedQuery::new(&COORDINATORS, Scope::Tenant(ctx.tenant_id()));
    if let Some(column) = COORDINATORS.column(IDENTITY_COLUMN) {
        query.filters.push(Filter {
            column,
            value: ctx.user_id().to_string(),
        });
    }
    query.limit = Some(1);
    Ok(!store.select_records(&query).await?.is_empty())
}

pub async fn require_coordinator(store: &dyn Store, ctx: &RequestContext) -> ServiceResult<()> {
    if is_coordinator(store, ctx).await? {
        Ok(())
    } else {
        warn!("User {} is not a coordinator of tenant {}", ctx.user_id(), ctx.tenant_id());
        Err(ServiceError::coordinator_required())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_gate_catalog_and_leave_membership_open() {
        let policy = GatePolicy::default();
        assert_eq!(policy.gate(ResourceKind::Sections, Mutation::Delete), Gate::Coordinator);
        assert_eq!(policy.gate(ResourceKind::Announcements, Mutation::Create), Gate::Coordinator);
        assert_eq!(policy.gate(ResourceKind::Batches, Mutation::Delete), Gate::Open);
        assert_eq!(policy.gate(ResourceKind::Students, Mutation::Update), Gate::Open);
        assert_eq!(policy.gate(ResourceKind::Coordinators, Mutation::Create), Gate::Coordinator);
        assert_eq!(policy.gate(ResourceKind::Coordinators, Mutation::Update), Gate::SelfService);
        assert_eq!(policy.gate(ResourceKind::Coordinators, Mutation::Delete), Gate::Coordinator);
    }

    #[test]
    fn overrides_replace_single_entries() {
        let policy = GatePolicy::from_overrides(&[
            "batches:delete=coordinator".to_string(),
            " trainers:update = self ".to_string(),
            "".to_string(),
        ])
        .unwrap();
        assert_eq!(policy.gate(ResourceKind::Batches, Mutation::Delete), Gate::Coordinator);
        assert_eq!(policy.gate(ResourceKind::Batches, Mutation::Create), Gate::Open);
        assert_eq!(policy.gate(ResourceKind::Trainers, Mutation::Update), Gate::SelfService);
    }

    #[test]
    fn bad_overrides_are_rejected() {
        let parse = |s: &str| GatePolicy::from_overrides(&[s.to_string()]);
        assert!(matches!(parse("batches-delete"), Err(PolicyError::Malformed(_))));
        assert!(matches!(parse("widgets:delete=open"), Err(PolicyError::UnknownResource(_))));
        assert!(matches!(parse("batches:destroy=open"), Err(PolicyError::UnknownMutation(_))));
        assert!(matches!(parse("batches:delete=admin"), Err(PolicyError::UnknownGate(_))));
        assert!(matches!(parse("batches:update=self"), Err(PolicyError::SelfServiceUnsupported(_))));
    }

    #[test]
    fn coordinator_creation_cannot_be_opened() {
        for gate in ["self", "open"] {
            let entry = format!("coordinators:create={gate}");
            assert!(matches!(GatePolicy::from_overrides(&[entry]), Err(PolicyError::Locked(_))));
        }
        let kept = GatePolicy::from_overrides(&["coordinators:create=coordinator".to_string()]).unwrap();
        assert_eq!(kept.gate(ResourceKind::Coordinators, Mutation::Create), Gate::Coordinator);
    }
}
