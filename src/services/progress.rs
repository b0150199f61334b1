//! Completion facts and quiz attempts for the calling student or trainer.

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::accessor::ResourceAccessor;
use super::context::RequestContext;
use super::error::{ServiceError, ServiceResult};
use crate::database::models::{ActorKey, CompletionFact, ContentKind, ContentRef, NewAttempt, QuizAttempt};
use crate::database::store::{record_id, record_uuid};
use crate::database::{DatabaseError, Store};
use crate::resources::ResourceKind;

pub struct ProgressLedger<'a> {
    store: &'a dyn Store,
    accessor: &'a ResourceAccessor<'a>,
}

impl<'a> ProgressLedger<'a> {
    pub fn new(store: &'a dyn Store, accessor: &'a ResourceAccessor<'a>) -> Self {
        Self { store, accessor }
    }

    /// With a batch the caller acts as an enrolled student of it, otherwise as a trainer
    pub async fn resolve_actor(&self, ctx: &RequestContext, batch_id: Option<Uuid>) -> ServiceResult<ActorKey> {
        match batch_id {
            Some(batch_id) => {
                let batch = self.accessor.get_if_owned(ctx, ResourceKind::Batches, batch_id).await?;
                let student = self
                    .accessor
                    .find_own(ctx, ResourceKind::Students)
                    .await?
                    .and_then(|row| record_id(&row))
                    .ok_or_else(|| ServiceError::Forbidden("You are not registered as a student of this school".into()))?;

                let enrolled = batch
                    .get("student_ids")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().any(|id| id.as_str() == Some(student.to_string().as_str())))
                    .unwrap_or(false);
                if !enrolled {
                    return Err(ServiceError::Forbidden("You are not enrolled in this batch".into()));
                }
                Ok(ActorKey::Student {
                    student_id: student,
                    batch_id,
                })
            }
            None => {
                let trainer = self
                    .accessor
                    .find_own(ctx, ResourceKind::Trainers)
                    .await?
                    .and_then(|row| record_id(&row))
                    .ok_or_else(|| ServiceError::Forbidden("You are not registered as a trainer of this school".into()))?;
                Ok(ActorKey::Trainer { trainer_id: trainer })
            }
        }
    }

    /// Content row and the course it belongs to
    async fn content(&self, ctx: &RequestContext, kind: ResourceKind, id: Uuid) -> ServiceResult<Uuid> {
        let row = self.accessor.get_if_owned(ctx, kind, id).await?;
        record_uuid(&row, "course_id").ok_or_else(|| ServiceError::not_found(kind))
    }

    /// Upsert: one current state per (content, actor); `completed_at` follows `completed`
    pub async fn record_completion(
        &self,
        ctx: &RequestContext,
        kind: ContentKind,
        content_id: Uuid,
        batch_id: Option<Uuid>,
        completed: bool,
    ) -> ServiceResult<CompletionFact> {
        let actor = self.resolve_actor(ctx, batch_id).await?;
        let course_id = self.content(ctx, kind.resource(), content_id).await?;

        let content = ContentRef {
            kind,
            id: content_id,
            course_id,
        };
        let fact = self
            .store
            .upsert_completion(&content, &actor, completed)
            .await
            .map_err(|e| gone_as_not_found(e, kind.resource()))?;
        debug!("Recorded {} {} completed={} for {:?}", kind.as_str(), content_id, completed, actor);
        Ok(fact)
    }

    /// Append-only
    pub async fn record_attempt(
        &self,
        ctx: &RequestContext,
        quiz_id: Uuid,
        batch_id: Option<Uuid>,
        score: i32,
        max_score: i32,
        answers: Value,
    ) -> ServiceResult<QuizAttempt> {
        if max_score < 0 {
            return Err(ServiceError::invalid_field("max_score", "must not be negative"));
        }
        if !(0..=max_score).contains(&score) {
            return Err(ServiceError::invalid_field("score", "must be between 0 and max_score"));
        }

        let actor = self.resolve_actor(ctx, batch_id).await?;
        let course_id = self.content(ctx, ResourceKind::Quizzes, quiz_id).await?;

        let attempt = NewAttempt {
            quiz_id,
            course_id,
            actor,
            score,
            max_score,
            answers,
        };
        self.store
            .insert_attempt(attempt)
            .await
            .map_err(|e| gone_as_not_found(e, ResourceKind::Quizzes))
    }

    pub async fn completed_content_ids(
        &self,
        ctx: &RequestContext,
        course_id: Uuid,
        batch_id: Option<Uuid>,
    ) -> ServiceResult<Vec<Uuid>> {
        let actor = self.resolve_actor(ctx, batch_id).await?;
        self.accessor.get_if_owned(ctx, ResourceKind::Courses, course_id).await?;
        Ok(self.store.completed_content_ids(course_id, &actor).await?)
    }

    /// Most recent attempt in the course, optionally for one quiz
    pub async fn latest_attempt(
        &self,
        ctx: &RequestContext,
        course_id: Uuid,
        batch_id: Option<Uuid>,
        quiz_id: Option<Uuid>,
    ) -> ServiceResult<Option<QuizAttempt>> {
        let actor = self.resolve_actor(ctx, batch_id).await?;
        self.accessor.get_if_owned(ctx, ResourceKind::Courses, course_id).await?;
        Ok(self.store.latest_attempt(course_id, &actor, quiz_id).await?)
    }
}

fn gone_as_not_found(err: DatabaseError, kind: ResourceKind) -> ServiceError {
    match err {
        DatabaseError::ForeignKeyViolation(_) => ServiceError::not_found(kind),
        DatabaseError::CheckViolation(_) => ServiceError::invalid("Progress values out of range"),
        other => other.into(),
    }
}
