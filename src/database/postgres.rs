use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, Executor, FromRow, PgPool, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    ActorKey, CompletionFact, ContentKind, ContentRef, Level, LevelAssignment, NewAttempt, QuizAttempt, Relation,
    Tenant,
};
use super::schema::SCHEMA;
use super::sql::{self, Bind, Statement};
use super::store::{Record, ScopedQuery, SectionDeletion, Store};
use crate::resources::{referrers, OnDelete, Ownership, ResourceSpec, COURSE_ASSIGNMENTS, LESSONS, QUIZZES};

const TENANT_COLUMNS: &str = "id, external_org_id, name, created_at, updated_at";
const COMPLETION_COLUMNS: &str =
    "id, content_kind, content_id, course_id, student_id, batch_id, trainer_id, completed, completed_at, updated_at";
const ATTEMPT_COLUMNS: &str =
    "id, quiz_id, course_id, student_id, batch_id, trainer_id, score, max_score, answers, attempted_at";

#[derive(FromRow)]
struct JsonRow {
    row: Value,
}

fn bind_query_as<'q, O>(
    mut q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    binds: &'q [Bind],
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    for bind in binds {
        q = match bind {
            Bind::Uuid(v) => q.bind(v),
            Bind::Text(v) => q.bind(v),
            Bind::Int(v) => q.bind(v),
            Bind::Json(v) => q.bind(v),
        };
    }
    q
}

fn into_record(row: JsonRow) -> Result<Record, DatabaseError> {
    match row.row {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Decode(format!("expected a JSON object, got {other}"))),
    }
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_records(&self, stmt: &Statement) -> Result<Vec<Record>, DatabaseError> {
        let rows = bind_query_as(sqlx::query_as::<_, JsonRow>(&stmt.sql), &stmt.binds)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(into_record).collect()
    }

    async fn fetch_record(&self, stmt: &Statement) -> Result<Option<Record>, DatabaseError> {
        let row = bind_query_as(sqlx::query_as::<_, JsonRow>(&stmt.sql), &stmt.binds)
            .fetch_optional(&self.pool)
            .await?;
        row.map(into_record).transpose()
    }

    fn document(values: &Record) -> (Vec<&str>, Value) {
        let columns = values.keys().map(String::as_str).collect();
        (columns, Value::Object(values.clone()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn verify_transactions(&self) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionsUnavailable(e.to_string()))?;
        sqlx::query("SELECT 1")
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::TransactionsUnavailable(e.to_string()))?;
        tx.rollback()
            .await
            .map_err(|e| DatabaseError::TransactionsUnavailable(e.to_string()))?;
        debug!("Transaction round-trip verified");
        Ok(())
    }

    async fn apply_schema(&self) -> Result<(), DatabaseError> {
        self.pool.execute(SCHEMA).await?;
        info!("Schema applied");
        Ok(())
    }

    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DatabaseError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn tenant_by_external_org(&self, external_org_id: &str) -> Result<Option<Tenant>, DatabaseError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE external_org_id = $1"
        ))
        .bind(external_org_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn insert_tenant(&self, external_org_id: Option<&str>, name: &str) -> Result<Tenant, DatabaseError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "INSERT INTO tenants (external_org_id, name) VALUES ($1, $2) RETURNING {TENANT_COLUMNS}"
        ))
        .bind(external_org_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn set_tenant_binding(&self, id: Uuid, external_org_id: Option<&str>) -> Result<Option<Tenant>, DatabaseError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "UPDATE tenants SET external_org_id = $2, updated_at = now() WHERE id = $1 RETURNING {TENANT_COLUMNS}"
        ))
        .bind(id)
        .bind(external_org_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn rename_tenant(&self, id: Uuid, name: &str) -> Result<Option<Tenant>, DatabaseError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "UPDATE tenants SET name = $2, updated_at = now() WHERE id = $1 RETURNING {TENANT_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, DatabaseError> {
        let tenants = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(tenants)
    }

    async fn select_records(&self, query: &ScopedQuery) -> Result<Vec<Record>, DatabaseError> {
        let stmt = sql::select(query, query.tenant()?, None);
        self.fetch_records(&stmt).await
    }

    async fn select_record(&self, query: &ScopedQuery, id: Uuid) -> Result<Option<Record>, DatabaseError> {
        let stmt = sql::select(query, query.tenant()?, Some(id));
        self.fetch_record(&stmt).await
    }

    async fn insert_record(&self, query: &ScopedQuery, mut values: Record) -> Result<Option<Record>, DatabaseError> {
        let tenant = query.tenant()?;
        if let (Ownership::Direct, Some(tenant)) = (query.spec.ownership, tenant) {
            values.insert("tenant_id".into(), Value::String(tenant.to_string()));
        }
        let (columns, document) = Self::document(&values);
        let stmt = sql::insert(query.spec, &columns, document, tenant);
        self.fetch_record(&stmt).await
    }

    async fn update_record(&self, query: &ScopedQuery, id: Uuid, patch: Record) -> Result<Option<Record>, DatabaseError> {
        let (columns, document) = Self::document(&patch);
        let stmt = sql::update(query.spec, &columns, document, id, query.tenant()?);
        self.fetch_record(&stmt).await
    }

    async fn delete_record(&self, query: &ScopedQuery, id: Uuid) -> Result<bool, DatabaseError> {
        let spec: &ResourceSpec = query.spec;
        let stmt = sql::delete(spec, id, query.tenant()?);

        let mut tx = self.pool.begin().await?;
        let deleted = bind_query_as(sqlx::query_as::<_, (Uuid,)>(&stmt.sql), &stmt.binds)
            .fetch_optional(&mut *tx)
            .await?;
        if deleted.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        for (referrer, reference) in referrers(spec.kind) {
            if reference.on_delete == OnDelete::Prune {
                let pruned = sqlx::query(&sql::prune(referrer.table, reference.column))
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                debug!(
                    "Pruned {} from {}.{} ({} rows)",
                    id,
                    referrer.table,
                    reference.column,
                    pruned.rows_affected()
                );
            }
        }
        if let Some(kind) = ContentKind::for_resource(spec.kind) {
            sqlx::query("DELETE FROM content_completions WHERE content_kind = $1 AND content_id = $2")
                .bind(kind.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_section_cascade(&self, section_id: Uuid) -> Result<Option<SectionDeletion>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let section = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM sections WHERE id = $1 FOR UPDATE")
            .bind(section_id)
            .fetch_optional(&mut *tx)
            .await?;
        if section.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        for kind in [ContentKind::Lesson, ContentKind::CourseAssignment] {
            let table = kind.resource().spec().table;
            sqlx::query(&format!(
                "DELETE FROM content_completions WHERE content_kind = $1 \
                 AND content_id IN (SELECT id FROM {} WHERE section_id = $2)",
                sql::quote(table)
            ))
            .bind(kind.as_str())
            .bind(section_id)
            .execute(&mut *tx)
            .await?;
        }

        let mut counts = [0u64; 3];
        for (count, spec) in counts.iter_mut().zip([&LESSONS, &QUIZZES, &COURSE_ASSIGNMENTS]) {
            *count = sqlx::query(&format!("DELETE FROM {} WHERE section_id = $1", sql::quote(spec.table)))
                .bind(section_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(section_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let [lessons, quizzes, course_assignments] = counts;
        Ok(Some(SectionDeletion {
            lessons,
            quizzes,
            course_assignments,
        }))
    }

    async fn activate_assignment(
        &self,
        relation: Relation,
        subject_id: Uuid,
        level_id: Uuid,
        assigned_by: &str,
    ) -> Result<LevelAssignment, DatabaseError> {
        let table = relation.table();
        let subject = relation.subject_column();
        let row = sqlx::query_as::<_, LevelAssignment>(&format!(
            "INSERT INTO {table} ({subject}, level_id, active, assigned_at, assigned_by) \
             VALUES ($1, $2, TRUE, now(), $3) \
             ON CONFLICT ({subject}, level_id) DO UPDATE \
             SET active = TRUE, assigned_at = now(), assigned_by = EXCLUDED.assigned_by, unassigned_at = NULL \
             RETURNING id, {subject} AS subject_id, level_id, active, assigned_at, assigned_by, unassigned_at"
        ))
        .bind(subject_id)
        .bind(level_id)
        .bind(assigned_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn deactivate_assignment(
        &self,
        relation: Relation,
        subject_id: Uuid,
        level_id: Uuid,
    ) -> Result<Option<LevelAssignment>, DatabaseError> {
        let table = relation.table();
        let subject = relation.subject_column();
        let row = sqlx::query_as::<_, LevelAssignment>(&format!(
            "UPDATE {table} \
             SET unassigned_at = CASE WHEN active THEN now() ELSE unassigned_at END, active = FALSE \
             WHERE {subject} = $1 AND level_id = $2 \
             RETURNING id, {subject} AS subject_id, level_id, active, assigned_at, assigned_by, unassigned_at"
        ))
        .bind(subject_id)
        .bind(level_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn assignment_history(&self, relation: Relation, subject_id: Uuid) -> Result<Vec<LevelAssignment>, DatabaseError> {
        let table = relation.table();
        let subject = relation.subject_column();
        let rows = sqlx::query_as::<_, LevelAssignment>(&format!(
            "SELECT id, {subject} AS subject_id, level_id, active, assigned_at, assigned_by, unassigned_at \
             FROM {table} WHERE {subject} = $1 ORDER BY assigned_at DESC, id"
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn active_levels(&self, relation: Relation, subject_id: Uuid) -> Result<Vec<Level>, DatabaseError> {
        let table = relation.table();
        let subject = relation.subject_column();
        let rows = sqlx::query_as::<_, Level>(&format!(
            "SELECT l.id, l.name, l.description, l.catalog_order, l.created_at, l.updated_at \
             FROM levels l JOIN {table} a ON a.level_id = l.id \
             WHERE a.{subject} = $1 AND a.active \
             ORDER BY l.catalog_order, l.name"
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_completion(
        &self,
        content: &ContentRef,
        actor: &ActorKey,
        completed: bool,
    ) -> Result<CompletionFact, DatabaseError> {
        let conflict_target = match actor {
            ActorKey::Student { .. } => "(content_kind, content_id, student_id, batch_id) WHERE trainer_id IS NULL",
            ActorKey::Trainer { .. } => "(content_kind, content_id, trainer_id) WHERE trainer_id IS NOT NULL",
        };
        let row = sqlx::query_as::<_, CompletionFact>(&format!(
            "INSERT INTO content_completions \
             (content_kind, content_id, course_id, student_id, batch_id, trainer_id, completed, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7::boolean, CASE WHEN $7::boolean THEN now() ELSE NULL END) \
             ON CONFLICT {conflict_target} DO UPDATE \
             SET completed = EXCLUDED.completed, \
                 completed_at = CASE WHEN EXCLUDED.completed THEN now() ELSE NULL END, \
                 updated_at = now() \
             RETURNING {COMPLETION_COLUMNS}"
        ))
        .bind(content.kind.as_str())
        .bind(content.id)
        .bind(content.course_id)
        .bind(actor.student_id())
        .bind(actor.batch_id())
        .bind(actor.trainer_id())
        .bind(completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, DatabaseError> {
        let row = sqlx::query_as::<_, QuizAttempt>(&format!(
            "INSERT INTO quiz_attempts \
             (quiz_id, course_id, student_id, batch_id, trainer_id, score, max_score, answers) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(attempt.quiz_id)
        .bind(attempt.course_id)
        .bind(attempt.actor.student_id())
        .bind(attempt.actor.batch_id())
        .bind(attempt.actor.trainer_id())
        .bind(attempt.score)
        .bind(attempt.max_score)
        .bind(&attempt.answers)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn completed_content_ids(&self, course_id: Uuid, actor: &ActorKey) -> Result<Vec<Uuid>, DatabaseError> {
        let (predicate, binds) = sql::actor_predicate(actor, 2);
        let mut all = vec![Bind::Uuid(course_id)];
        all.extend(binds);
        let sql = format!(
            "SELECT content_id FROM content_completions \
             WHERE course_id = $1 AND completed AND {predicate} ORDER BY completed_at, content_id"
        );
        let rows = bind_query_as(sqlx::query_as::<_, (Uuid,)>(&sql), &all)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn latest_attempt(
        &self,
        course_id: Uuid,
        actor: &ActorKey,
        quiz_id: Option<Uuid>,
    ) -> Result<Option<QuizAttempt>, DatabaseError> {
        let (predicate, binds) = sql::actor_predicate(actor, 2);
        let mut all = vec![Bind::Uuid(course_id)];
        all.extend(binds);
        let mut sql = format!("SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE course_id = $1 AND {predicate}");
        if let Some(quiz_id) = quiz_id {
            all.push(Bind::Uuid(quiz_id));
            sql.push_str(&format!(" AND quiz_id = ${}", all.len()));
        }
        sql.push_str(" ORDER BY attempted_at DESC LIMIT 1");
        let row = bind_query_as(sqlx::query_as::<_, QuizAttempt>(&sql), &all)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
