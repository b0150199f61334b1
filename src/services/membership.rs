//! First-sight registration of a principal in a school, and the "who am I" view.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::accessor::ResourceAccessor;
use super::context::RequestContext;
use super::error::{ServiceError, ServiceResult};
use crate::auth::Principal;
use crate::database::models::Tenant;
use crate::database::Record;
use crate::resources::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Coordinator,
    Trainer,
    Student,
}

impl MemberRole {
    pub fn resource(self) -> ResourceKind {
        match self {
            MemberRole::Coordinator => ResourceKind::Coordinators,
            MemberRole::Trainer => ResourceKind::Trainers,
            MemberRole::Student => ResourceKind::Students,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub role: MemberRole,
    pub created: bool,
    pub record: Record,
}

#[derive(Debug, Clone, Serialize)]
pub struct Whoami {
    pub principal: Principal,
    pub tenant: Tenant,
    pub coordinator: Option<Record>,
    pub trainer: Option<Record>,
    pub student: Option<Record>,
}

pub struct Membership<'a> {
    accessor: &'a ResourceAccessor<'a>,
    coordinator_org_role: &'a str,
}

impl<'a> Membership<'a> {
    pub fn new(accessor: &'a ResourceAccessor<'a>, coordinator_org_role: &'a str) -> Self {
        Self {
            accessor,
            coordinator_org_role,
        }
    }

    /// Returns the caller's row for `role`, creating it from `profile` the first time
    pub async fn sync(&self, ctx: &RequestContext, role: MemberRole, profile: Map<String, Value>) -> ServiceResult<SyncOutcome> {
        let kind = role.resource();
        if let Some(record) = self.accessor.find_own(ctx, kind).await? {
            return Ok(SyncOutcome {
                role,
                created: false,
                record,
            });
        }

        if role == MemberRole::Coordinator && ctx.principal.org_role.as_deref() != Some(self.coordinator_org_role) {
            warn!(
                "User {} tried to register as coordinator of tenant {} with org role {:?}",
                ctx.user_id(),
                ctx.tenant_id(),
                ctx.principal.org_role
            );
            return Err(ServiceError::Forbidden(format!(
                "Only members with the {} organization role can register as coordinator",
                self.coordinator_org_role
            )));
        }

        let record = match self.accessor.create_as_self(ctx, kind, Value::Object(profile)).await {
            Ok(record) => record,
            // A concurrent sync for the same user won the insert
            Err(ServiceError::Conflict(message)) => match self.accessor.find_own(ctx, kind).await? {
                Some(record) => {
                    return Ok(SyncOutcome {
                        role,
                        created: false,
                        record,
                    })
                }
                None => return Err(ServiceError::Conflict(message)),
            },
            Err(e) => return Err(e),
        };
        info!("Registered {} as {} of tenant {}", ctx.user_id(), kind.noun(), ctx.tenant_id());
        Ok(SyncOutcome {
            role,
            created: true,
            record,
        })
    }

    pub async fn whoami(&self, ctx: &RequestContext) -> ServiceResult<Whoami> {
        let (coordinator, trainer, student) = futures::try_join!(
            self.accessor.find_own(ctx, ResourceKind::Coordinators),
            self.accessor.find_own(ctx, ResourceKind::Trainers),
            self.accessor.find_own(ctx, ResourceKind::Students),
        )?;
        Ok(Whoami {
            principal: ctx.principal.clone(),
            tenant: ctx.tenant.clone(),
            coordinator,
            trainer,
            student,
        })
    }
}
