//! Trainer/batch to level links that are switched off rather than deleted.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::accessor::ResourceAccessor;
use super::context::RequestContext;
use super::error::{ServiceError, ServiceResult};
use super::role_gate::require_coordinator;
use crate::database::models::{Level, LevelAssignment, Relation};
use crate::database::{DatabaseError, Scope, ScopedQuery, Store};
use crate::resources::{ResourceKind, LEVELS};

/// Either the active levels or the full assignment history of a subject
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SubjectLevels {
    Active(Vec<Level>),
    History(Vec<LevelAssignment>),
}

pub struct LevelAssignments<'a> {
    store: &'a dyn Store,
    accessor: &'a ResourceAccessor<'a>,
}

impl<'a> LevelAssignments<'a> {
    pub fn new(store: &'a dyn Store, accessor: &'a ResourceAccessor<'a>) -> Self {
        Self { store, accessor }
    }

    /// The subject must be owned by the caller's tenant; otherwise it does not exist for them
    async fn owned_subject(&self, ctx: &RequestContext, subject: ResourceKind, subject_id: Uuid) -> ServiceResult<Relation> {
        let relation = Relation::for_subject(subject)
            .ok_or_else(|| ServiceError::NotFound(format!("{} has no level assignments", subject.noun())))?;
        self.accessor.get_if_owned(ctx, subject, subject_id).await?;
        Ok(relation)
    }

    pub async fn assign(
        &self,
        ctx: &RequestContext,
        subject: ResourceKind,
        subject_id: Uuid,
        level_id: Uuid,
    ) -> ServiceResult<LevelAssignment> {
        require_coordinator(self.store, ctx).await?;
        let relation = self.owned_subject(ctx, subject, subject_id).await?;

        let level = ScopedQuery::new(&LEVELS, Scope::Shared);
        if self.store.select_record(&level, level_id).await?.is_none() {
            return Err(ServiceError::not_found(ResourceKind::Levels));
        }

        let row = self
            .store
            .activate_assignment(relation, subject_id, level_id, ctx.user_id())
            .await
            .map_err(|e| match e {
                // Subject or level removed between the checks and the write
                DatabaseError::ForeignKeyViolation(_) => ServiceError::not_found(subject),
                other => other.into(),
            })?;
        info!(
            "Level {} assigned to {} {} by {}",
            level_id,
            subject.noun(),
            subject_id,
            ctx.user_id()
        );
        Ok(row)
    }

    /// Idempotent: an absent row is not an error
    pub async fn unassign(
        &self,
        ctx: &RequestContext,
        subject: ResourceKind,
        subject_id: Uuid,
        level_id: Uuid,
    ) -> ServiceResult<Option<LevelAssignment>> {
        require_coordinator(self.store, ctx).await?;
        let relation = self.owned_subject(ctx, subject, subject_id).await?;

        let row = self.store.deactivate_assignment(relation, subject_id, level_id).await?;
        if row.is_some() {
            info!("Level {} unassigned from {} {} by {}", level_id, subject.noun(), subject_id, ctx.user_id());
        }
        Ok(row)
    }

    pub async fn list_active(&self, ctx: &RequestContext, subject: ResourceKind, subject_id: Uuid) -> ServiceResult<Vec<Level>> {
        let relation = self.owned_subject(ctx, subject, subject_id).await?;
        Ok(self.store.active_levels(relation, subject_id).await?)
    }

    pub async fn history(
        &self,
        ctx: &RequestContext,
        subject: ResourceKind,
        subject_id: Uuid,
    ) -> ServiceResult<Vec<LevelAssignment>> {
        let relation = self.owned_subject(ctx, subject, subject_id).await?;
        Ok(self.store.assignment_history(relation, subject_id).await?)
    }

    pub async fn levels(
        &self,
        ctx: &RequestContext,
        subject: ResourceKind,
        subject_id: Uuid,
        include_history: bool,
    ) -> ServiceResult<SubjectLevels> {
        if include_history {
            self.history(ctx, subject, subject_id).await.map(SubjectLevels::History)
        } else {
            self.list_active(ctx, subject, subject_id).await.map(SubjectLevels::Active)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use serde_json::json;

    #[tokio::test]
    async fn assign_twice_keeps_one_active_row() {
        let t = TestContext::new().await;
        let school = t.school("org_a", "coord_a").await;
        let trainer = t.create(&school, ResourceKind::Trainers, json!({"name": "T1"})).await;
        let level = t.level("L1", 1).await;

        let accessor = t.accessor();
        let relation = LevelAssignments::new(t.store(), &accessor);
        relation.assign(&school, ResourceKind::Trainers, trainer, level).await.unwrap();
        relation.assign(&school, ResourceKind::Trainers, trainer, level).await.unwrap();

        let history = relation.history(&school, ResourceKind::Trainers, trainer).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].active);
        assert_eq!(history[0].assigned_by, "coord_a");
    }

    #[tokio::test]
    async fn unassign_is_idempotent_and_keeps_history() {
        let t = TestContext::new().await;
        let school = t.school("org_a", "coord_a").await;
        let batch = t.create(&school, ResourceKind::Batches, json!({"name": "B1"})).await;
        let level = t.level("L1", 1).await;

        let accessor = t.accessor();
        let relation = LevelAssignments::new(t.store(), &accessor);
        assert!(relation.unassign(&school, ResourceKind::Batches, batch, level).await.unwrap().is_none());

        relation.assign(&school, ResourceKind::Batches, batch, level).await.unwrap();
        relation.unassign(&school, ResourceKind::Batches, batch, level).await.unwrap();
        relation.unassign(&school, ResourceKind::Batches, batch, level).await.unwrap();

        assert!(relation.list_active(&school, ResourceKind::Batches, batch).await.unwrap().is_empty());
        let history = relation.history(&school, ResourceKind::Batches, batch).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].active);
        assert!(history[0].unassigned_at.is_some());
    }

    #[tokio::test]
    async fn active_levels_follow_catalog_order() {
        let t = TestContext::new().await;
        let school = t.school("org_a", "coord_a").await;
        let trainer = t.create(&school, ResourceKind::Trainers, json!({"name": "T1"})).await;
        let advanced = t.level("Advanced", 3).await;
        let basic = t.level("Basic", 1).await;

        let accessor = t.accessor();
        let relation = LevelAssignments::new(t.store(), &accessor);
        for level in [advanced, basic] {
            relation.assign(&school, ResourceKind::Trainers, trainer, level).await.unwrap();
        }
        let names: Vec<String> = relation
            .list_active(&school, ResourceKind::Trainers, trainer)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, ["Basic", "Advanced"]);
    }

    #[tokio::test]
    async fn non_coordinators_and_other_tenants_are_refused() {
        let t = TestContext::new().await;
        let school = t.school("org_a", "coord_a").await;
        let other = t.school("org_b", "coord_b").await;
        let trainer = t.create(&school, ResourceKind::Trainers, json!({"name": "T1"})).await;
        let level = t.level("L1", 1).await;
        let accessor = t.accessor();
        let relation = LevelAssignments::new(t.store(), &accessor);

        let outsider = t.member_of(&school, "someone_else");
        assert!(matches!(
            relation.assign(&outsider, ResourceKind::Trainers, trainer, level).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            relation.assign(&other, ResourceKind::Trainers, trainer, level).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            relation.list_active(&other, ResourceKind::Trainers, trainer).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            relation.assign(&school, ResourceKind::Trainers, trainer, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
