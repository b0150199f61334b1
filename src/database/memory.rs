//! In-process store for tests and `DATABASE_BACKEND=memory`.
//!
//! Every write takes the single table lock, validates against the current
//! state, then applies, so a rejected write leaves nothing behind. Unique
//! groups and foreign-key behaviour follow the resource descriptors and the
//! embedded DDL.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    ActorKey, CompletionFact, ContentRef, Level, LevelAssignment, NewAttempt, QuizAttempt, Relation,
    Tenant,
};
use super::store::{record_id, record_uuid, Record, ScopedQuery, SectionDeletion, Store};
use crate::resources::{
    referrers, ColumnType, OnDelete, Ownership, ResourceKind, ResourceSpec, COURSE_ASSIGNMENTS, LESSONS, QUIZZES,
};

type RowKey = (ResourceKind, Uuid);

#[derive(Default)]
struct Tables {
    tenants: Vec<Tenant>,
    records: HashMap<ResourceKind, Vec<Record>>,
    relations: Vec<(Relation, LevelAssignment)>,
    completions: Vec<CompletionFact>,
    attempts: Vec<QuizAttempt>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, false))
}

/// Postgres-like ordering: numbers and strings by value, nulls last
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

impl Tables {
    fn rows(&self, kind: ResourceKind) -> &[Record] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn find(&self, kind: ResourceKind, id: Uuid) -> Option<&Record> {
        self.rows(kind).iter().find(|row| record_id(row) == Some(id))
    }

    fn exists(&self, kind: ResourceKind, id: Uuid) -> bool {
        self.find(kind, id).is_some()
    }

    /// Walks the ownership chain of `row` and compares the tenant it ends at
    fn owned_by(&self, spec: &ResourceSpec, row: &Record, tenant: Option<Uuid>) -> bool {
        let Some(tenant) = tenant else {
            return true;
        };
        match spec.ownership {
            Ownership::Shared => true,
            Ownership::Direct => record_uuid(row, "tenant_id") == Some(tenant),
            Ownership::Through(hops) => {
                let mut current = row;
                for hop in hops {
                    let parent = record_uuid(current, hop.column).and_then(|id| self.find(hop.parent, id));
                    match parent {
                        Some(parent) => current = parent,
                        None => return false,
                    }
                }
                record_uuid(current, "tenant_id") == Some(tenant)
            }
        }
    }

    fn check_foreign_keys(&self, spec: &ResourceSpec, row: &Record) -> Result<(), DatabaseError> {
        for reference in spec.references {
            let is_scalar = spec
                .column(reference.column)
                .map(|c| c.ty == ColumnType::Uuid)
                .unwrap_or(false);
            if !is_scalar {
                continue;
            }
            if let Some(target) = record_uuid(row, reference.column) {
                if !self.exists(reference.target, target) {
                    return Err(DatabaseError::ForeignKeyViolation(format!(
                        "{}_{}_fkey",
                        spec.table, reference.column
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_unique(&self, spec: &ResourceSpec, row: &Record, skip: Option<Uuid>) -> Result<(), DatabaseError> {
        for group in spec.unique {
            let values: Vec<&Value> = group.iter().filter_map(|c| row.get(*c)).collect();
            // NULLs never collide, as in SQL
            if values.len() != group.len() || values.iter().any(|v| v.is_null()) {
                continue;
            }
            let clash = self.rows(spec.kind).iter().any(|other| {
                record_id(other) != skip && group.iter().zip(&values).all(|(c, v)| other.get(*c) == Some(*v))
            });
            if clash {
                return Err(DatabaseError::UniqueViolation(format!("{}_{}_key", spec.table, group.join("_"))));
            }
        }
        Ok(())
    }

    /// Collects the row and everything that cascades from it; fails on a restricting reference
    fn plan_delete(&self, kind: ResourceKind, id: Uuid, doomed: &mut HashSet<RowKey>) -> Result<(), DatabaseError> {
        if !doomed.insert((kind, id)) {
            return Ok(());
        }
        for (spec, reference) in referrers(kind) {
            let dependents: Vec<Uuid> = self
                .rows(spec.kind)
                .iter()
                .filter(|row| record_uuid(row, reference.column) == Some(id))
                .filter_map(record_id)
                .collect();
            for dependent in dependents {
                match reference.on_delete {
                    OnDelete::Cascade => self.plan_delete(spec.kind, dependent, doomed)?,
                    OnDelete::Restrict if !doomed.contains(&(spec.kind, dependent)) => {
                        return Err(DatabaseError::ForeignKeyViolation(format!(
                            "{}_{}_fkey",
                            spec.table, reference.column
                        )));
                    }
                    _ => {}
                }
            }
        }
        if kind == ResourceKind::Levels {
            if let Some((relation, _)) = self.relations.iter().find(|(_, row)| row.level_id == id) {
                return Err(DatabaseError::ForeignKeyViolation(format!("{}_level_id_fkey", relation.table())));
            }
        }
        Ok(())
    }

    fn apply_delete(&mut self, doomed: &HashSet<RowKey>) {
        let gone = |kind: ResourceKind, id: Option<Uuid>| id.map(|id| doomed.contains(&(kind, id))).unwrap_or(false);
        let now = timestamp(Utc::now());

        for (kind, rows) in self.records.iter_mut() {
            rows.retain(|row| !gone(*kind, record_id(row)));

            for reference in kind.spec().references.iter().filter(|r| r.on_delete == OnDelete::Prune) {
                for row in rows.iter_mut() {
                    let Some(Value::Array(items)) = row.get_mut(reference.column) else {
                        continue;
                    };
                    let before = items.len();
                    items.retain(|item| !gone(reference.target, item.as_str().and_then(|s| s.parse().ok())));
                    if items.len() != before {
                        row.insert("updated_at".into(), now.clone());
                    }
                }
            }
        }

        self.relations.retain(|(relation, row)| {
            !gone(relation.subject_kind(), Some(row.subject_id)) && !gone(ResourceKind::Levels, Some(row.level_id))
        });
        self.completions.retain(|row| {
            let content = match row.content_kind.as_str() {
                "lesson" => ResourceKind::Lessons,
                _ => ResourceKind::CourseAssignments,
            };
            !(gone(content, Some(row.content_id))
                || gone(ResourceKind::Courses, Some(row.course_id))
                || gone(ResourceKind::Students, row.student_id)
                || gone(ResourceKind::Batches, row.batch_id)
                || gone(ResourceKind::Trainers, row.trainer_id))
        });
        self.attempts.retain(|row| {
            !(gone(ResourceKind::Quizzes, Some(row.quiz_id))
                || gone(ResourceKind::Courses, Some(row.course_id))
                || gone(ResourceKind::Students, row.student_id)
                || gone(ResourceKind::Batches, row.batch_id)
                || gone(ResourceKind::Trainers, row.trainer_id))
        });
    }

    fn check_actor(&self, actor: &ActorKey, table: &str) -> Result<(), DatabaseError> {
        let missing = match actor {
            ActorKey::Student { student_id, batch_id } => {
                (!self.exists(ResourceKind::Students, *student_id)).then_some("student_id")
                    .or((!self.exists(ResourceKind::Batches, *batch_id)).then_some("batch_id"))
            }
            ActorKey::Trainer { trainer_id } => (!self.exists(ResourceKind::Trainers, *trainer_id)).then_some("trainer_id"),
        };
        match missing {
            Some(column) => Err(DatabaseError::ForeignKeyViolation(format!("{table}_{column}_fkey"))),
            None => Ok(()),
        }
    }

    fn check_tenant_binding(&self, external_org_id: Option<&str>, skip: Option<Uuid>) -> Result<(), DatabaseError> {
        let Some(org) = external_org_id else {
            return Ok(());
        };
        let taken = self
            .tenants
            .iter()
            .any(|t| Some(t.id) != skip && t.external_org_id.as_deref() == Some(org));
        if taken {
            return Err(DatabaseError::UniqueViolation("tenants_external_org_id_key".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn verify_transactions(&self) -> Result<(), DatabaseError> {
        // Writes are serialized behind one lock and validated before they apply
        Ok(())
    }

    async fn apply_schema(&self) -> Result<(), DatabaseError> {
        debug!("Memory store needs no schema");
        Ok(())
    }

    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn tenant_by_external_org(&self, external_org_id: &str) -> Result<Option<Tenant>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .tenants
            .iter()
            .find(|t| t.external_org_id.as_deref() == Some(external_org_id))
            .cloned())
    }

    async fn insert_tenant(&self, external_org_id: Option<&str>, name: &str) -> Result<Tenant, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.check_tenant_binding(external_org_id, None)?;
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            external_org_id: external_org_id.map(str::to_string),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn set_tenant_binding(&self, id: Uuid, external_org_id: Option<&str>) -> Result<Option<Tenant>, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.check_tenant_binding(external_org_id, Some(id))?;
        Ok(tables.tenants.iter_mut().find(|t| t.id == id).map(|t| {
            t.external_org_id = external_org_id.map(str::to_string);
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn rename_tenant(&self, id: Uuid, name: &str) -> Result<Option<Tenant>, DatabaseError> {
        let mut tables = self.tables.write().await;
        Ok(tables.tenants.iter_mut().find(|t| t.id == id).map(|t| {
            t.name = name.to_string();
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.tenants.clone())
    }

    async fn select_records(&self, query: &ScopedQuery) -> Result<Vec<Record>, DatabaseError> {
        let tenant = query.tenant()?;
        let spec = query.spec;
        let tables = self.tables.read().await;

        let mut rows: Vec<Record> = tables
            .rows(spec.kind)
            .iter()
            .filter(|row| tables.owned_by(spec, row, tenant))
            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            spec.order_by
                .iter()
                .chain(["created_at"].iter())
                .map(|c| compare_values(a.get(*c), b.get(*c)))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn select_record(&self, query: &ScopedQuery, id: Uuid) -> Result<Option<Record>, DatabaseError> {
        let tenant = query.tenant()?;
        let tables = self.tables.read().await;
        Ok(tables
            .find(query.spec.kind, id)
            .filter(|row| tables.owned_by(query.spec, row, tenant))
            .cloned())
    }

    async fn insert_record(&self, query: &ScopedQuery, values: Record) -> Result<Option<Record>, DatabaseError> {
        let tenant = query.tenant()?;
        let spec = query.spec;
        let mut tables = self.tables.write().await;

        let now = timestamp(Utc::now());
        let mut row = Record::new();
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        if let (Ownership::Direct, Some(tenant)) = (spec.ownership, tenant) {
            row.insert("tenant_id".into(), Value::String(tenant.to_string()));
        }
        for column in spec.columns {
            row.insert(column.name.into(), values.get(column.name).cloned().unwrap_or(Value::Null));
        }
        row.insert("created_at".into(), now.clone());
        row.insert("updated_at".into(), now);

        if matches!(spec.ownership, Ownership::Through(_)) && !tables.owned_by(spec, &row, tenant) {
            return Ok(None);
        }
        tables.check_foreign_keys(spec, &row)?;
        tables.check_unique(spec, &row, None)?;

        tables.records.entry(spec.kind).or_default().push(row.clone());
        Ok(Some(row))
    }

    async fn update_record(&self, query: &ScopedQuery, id: Uuid, patch: Record) -> Result<Option<Record>, DatabaseError> {
        let tenant = query.tenant()?;
        let spec = query.spec;
        let mut tables = self.tables.write().await;

        let Some(current) = tables.find(spec.kind, id).filter(|row| tables.owned_by(spec, row, tenant)) else {
            return Ok(None);
        };
        let mut updated = current.clone();
        for (column, value) in patch {
            updated.insert(column, value);
        }
        updated.insert("updated_at".into(), timestamp(Utc::now()));

        tables.check_foreign_keys(spec, &updated)?;
        tables.check_unique(spec, &updated, Some(id))?;

        if let Some(slot) = tables
            .records
            .get_mut(&spec.kind)
            .and_then(|rows| rows.iter_mut().find(|row| record_id(row) == Some(id)))
        {
            *slot = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn delete_record(&self, query: &ScopedQuery, id: Uuid) -> Result<bool, DatabaseError> {
        let tenant = query.tenant()?;
        let spec = query.spec;
        let mut tables = self.tables.write().await;

        let owned = tables
            .find(spec.kind, id)
            .map(|row| tables.owned_by(spec, row, tenant))
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }

        let mut doomed = HashSet::new();
        tables.plan_delete(spec.kind, id, &mut doomed)?;
        debug!("Deleting {} rows for {} {}", doomed.len(), spec.table, id);
        tables.apply_delete(&doomed);
        Ok(true)
    }

    async fn delete_section_cascade(&self, section_id: Uuid) -> Result<Option<SectionDeletion>, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.exists(ResourceKind::Sections, section_id) {
            return Ok(None);
        }

        let mut doomed = HashSet::new();
        let mut counts = [0u64; 3];
        for (count, spec) in counts.iter_mut().zip([&LESSONS, &QUIZZES, &COURSE_ASSIGNMENTS]) {
            for row in tables.rows(spec.kind) {
                if record_uuid(row, "section_id") == Some(section_id) {
                    if let Some(id) = record_id(row) {
                        doomed.insert((spec.kind, id));
                        *count += 1;
                    }
                }
            }
        }
        doomed.insert((ResourceKind::Sections, section_id));
        tables.apply_delete(&doomed);

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
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some((_, row)) = tables
            .relations
            .iter_mut()
            .find(|(r, row)| *r == relation && row.subject_id == subject_id && row.level_id == level_id)
        {
            row.active = true;
            row.assigned_at = now;
            row.assigned_by = assigned_by.to_string();
            row.unassigned_at = None;
            return Ok(row.clone());
        }

        if !tables.exists(relation.subject_kind(), subject_id) {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "{}_{}_fkey",
                relation.table(),
                relation.subject_column()
            )));
        }
        if !tables.exists(ResourceKind::Levels, level_id) {
            return Err(DatabaseError::ForeignKeyViolation(format!("{}_level_id_fkey", relation.table())));
        }

        let row = LevelAssignment {
            id: Uuid::new_v4(),
            subject_id,
            level_id,
            active: true,
            assigned_at: now,
            assigned_by: assigned_by.to_string(),
            unassigned_at: None,
        };
        tables.relations.push((relation, row.clone()));
        Ok(row)
    }

    async fn deactivate_assignment(
        &self,
        relation: Relation,
        subject_id: Uuid,
        level_id: Uuid,
    ) -> Result<Option<LevelAssignment>, DatabaseError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .relations
            .iter_mut()
            .find(|(r, row)| *r == relation && row.subject_id == subject_id && row.level_id == level_id)
            .map(|(_, row)| {
                if row.active {
                    row.unassigned_at = Some(Utc::now());
                }
                row.active = false;
                row.clone()
            }))
    }

    async fn assignment_history(&self, relation: Relation, subject_id: Uuid) -> Result<Vec<LevelAssignment>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<LevelAssignment> = tables
            .relations
            .iter()
            .filter(|(r, row)| *r == relation && row.subject_id == subject_id)
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(rows)
    }

    async fn active_levels(&self, relation: Relation, subject_id: Uuid) -> Result<Vec<Level>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut levels = tables
            .relations
            .iter()
            .filter(|(r, row)| *r == relation && row.subject_id == subject_id && row.active)
            .filter_map(|(_, row)| tables.find(ResourceKind::Levels, row.level_id))
            .map(|row| {
                serde_json::from_value::<Level>(Value::Object(row.clone()))
                    .map_err(|e| DatabaseError::Decode(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        levels.sort_by(|a, b| a.catalog_order.cmp(&b.catalog_order).then_with(|| a.name.cmp(&b.name)));
        Ok(levels)
    }

    async fn upsert_completion(
        &self,
        content: &ContentRef,
        actor: &ActorKey,
        completed: bool,
    ) -> Result<CompletionFact, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let completed_at = completed.then_some(now);

        if let Some(row) = tables.completions.iter_mut().find(|row| {
            row.content_kind == content.kind.as_str()
                && row.content_id == content.id
                && actor.matches(row.student_id, row.batch_id, row.trainer_id)
        }) {
            row.completed = completed;
            row.completed_at = completed_at;
            row.updated_at = now;
            return Ok(row.clone());
        }

        if !tables.exists(ResourceKind::Courses, content.course_id) {
            return Err(DatabaseError::ForeignKeyViolation("content_completions_course_id_fkey".into()));
        }
        tables.check_actor(actor, "content_completions")?;

        let row = CompletionFact {
            id: Uuid::new_v4(),
            content_kind: content.kind.as_str().to_string(),
            content_id: content.id,
            course_id: content.course_id,
            student_id: actor.student_id(),
            batch_id: actor.batch_id(),
            trainer_id: actor.trainer_id(),
            completed,
            completed_at,
            updated_at: now,
        };
        tables.completions.push(row.clone());
        Ok(row)
    }

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, DatabaseError> {
        let mut tables = self.tables.write().await;
        if attempt.score < 0 || attempt.score > attempt.max_score {
            return Err(DatabaseError::CheckViolation("quiz_attempts_score_check".into()));
        }
        if !tables.exists(ResourceKind::Quizzes, attempt.quiz_id) {
            return Err(DatabaseError::ForeignKeyViolation("quiz_attempts_quiz_id_fkey".into()));
        }
        tables.check_actor(&attempt.actor, "quiz_attempts")?;

        let row = QuizAttempt {
            id: Uuid::new_v4(),
            quiz_id: attempt.quiz_id,
            course_id: attempt.course_id,
            student_id: attempt.actor.student_id(),
            batch_id: attempt.actor.batch_id(),
            trainer_id: attempt.actor.trainer_id(),
            score: attempt.score,
            max_score: attempt.max_score,
            answers: attempt.answers,
            attempted_at: Utc::now(),
        };
        tables.attempts.push(row.clone());
        Ok(row)
    }

    async fn completed_content_ids(&self, course_id: Uuid, actor: &ActorKey) -> Result<Vec<Uuid>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&CompletionFact> = tables
            .completions
            .iter()
            .filter(|row| row.course_id == course_id && row.completed)
            .filter(|row| actor.matches(row.student_id, row.batch_id, row.trainer_id))
            .collect();
        rows.sort_by_key(|row| row.completed_at);
        Ok(rows.into_iter().map(|row| row.content_id).collect())
    }

    async fn latest_attempt(
        &self,
        course_id: Uuid,
        actor: &ActorKey,
        quiz_id: Option<Uuid>,
    ) -> Result<Option<QuizAttempt>, DatabaseError> {
        let tables = self.tables.read().await;
        // max_by_key keeps the last of equal timestamps, i.e. the most recent insert
        Ok(tables
            .attempts
            .iter()
            .filter(|row| row.course_id == course_id)
            .filter(|row| quiz_id.map(|q| row.quiz_id == q).unwrap_or(true))
            .filter(|row| actor.matches(row.student_id, row.batch_id, row.trainer_id))
            .max_by_key(|row| row.attempted_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::ContentKind;
    use crate::database::store::Scope;
    use crate::resources::{BATCHES, COORDINATORS, COURSES, LEVELS, SECTIONS, SESSIONS, TRAINERS};
    use serde_json::json;

    fn values(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    async fn insert(store: &MemoryStore, spec: &'static ResourceSpec, scope: Scope, v: Value) -> Record {
        store
            .insert_record(&ScopedQuery::new(spec, scope), values(v))
            .await
            .unwrap()
            .unwrap()
    }

    fn id(row: &Record) -> Uuid {
        record_id(row).unwrap()
    }

    #[tokio::test]
    async fn tenant_binding_is_unique() {
        let store = MemoryStore::new();
        let a = store.insert_tenant(Some("org_a"), "A").await.unwrap();
        assert!(matches!(
            store.insert_tenant(Some("org_a"), "again").await,
            Err(DatabaseError::UniqueViolation(_))
        ));
        let b = store.insert_tenant(None, "B").await.unwrap();
        assert!(matches!(
            store.set_tenant_binding(b.id, Some("org_a")).await,
            Err(DatabaseError::UniqueViolation(_))
        ));
        // rebinding a tenant to its own org is not a clash
        assert!(store.set_tenant_binding(a.id, Some("org_a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn one_coordinator_per_tenant() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        insert(&store, &COORDINATORS, Scope::Tenant(tenant), json!({"name": "c1", "external_user_id": "u1"})).await;
        let second = store
            .insert_record(
                &ScopedQuery::new(&COORDINATORS, Scope::Tenant(tenant)),
                values(json!({"name": "c2", "external_user_id": "u2"})),
            )
            .await;
        assert!(matches!(second, Err(DatabaseError::UniqueViolation(c)) if c == "coordinators_tenant_id_key"));
    }

    #[tokio::test]
    async fn member_identity_collides_only_within_a_tenant() {
        let store = MemoryStore::new();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        insert(&store, &TRAINERS, Scope::Tenant(t1), json!({"name": "a", "external_user_id": "u1"})).await;
        insert(&store, &TRAINERS, Scope::Tenant(t2), json!({"name": "b", "external_user_id": "u1"})).await;

        let again = store
            .insert_record(
                &ScopedQuery::new(&TRAINERS, Scope::Tenant(t1)),
                values(json!({"name": "c", "external_user_id": "u1"})),
            )
            .await;
        assert!(matches!(again, Err(DatabaseError::UniqueViolation(c)) if c == "trainers_tenant_id_external_user_id_key"));
    }

    #[tokio::test]
    async fn through_rows_are_invisible_to_other_tenants() {
        let store = MemoryStore::new();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let batch = insert(&store, &BATCHES, Scope::Tenant(t1), json!({"name": "b", "trainer_ids": [], "student_ids": []})).await;
        let session = json!({"batch_id": id(&batch), "title": "s", "scheduled_at": "2024-01-01T00:00:00.000000+00:00"});

        // a foreign tenant cannot attach a child to t1's batch
        let foreign = store
            .insert_record(&ScopedQuery::new(&SESSIONS, Scope::Tenant(t2)), values(session.clone()))
            .await
            .unwrap();
        assert!(foreign.is_none());

        let row = insert(&store, &SESSIONS, Scope::Tenant(t1), session).await;
        let theirs = store.select_records(&ScopedQuery::new(&SESSIONS, Scope::Tenant(t2))).await.unwrap();
        assert!(theirs.is_empty());
        assert!(!store.delete_record(&ScopedQuery::new(&SESSIONS, Scope::Tenant(t2)), id(&row)).await.unwrap());
        assert_eq!(store.select_records(&ScopedQuery::new(&SESSIONS, Scope::Tenant(t1))).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_trainer_prunes_batch_lists_and_relations() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let trainer = insert(&store, &TRAINERS, Scope::Tenant(tenant), json!({"name": "t"})).await;
        let batch = insert(
            &store,
            &BATCHES,
            Scope::Tenant(tenant),
            json!({"name": "b", "trainer_ids": [id(&trainer).to_string()], "student_ids": []}),
        )
        .await;
        let level = insert(&store, &LEVELS, Scope::Shared, json!({"name": "L1", "catalog_order": 1})).await;
        store
            .activate_assignment(Relation::TrainerLevel, id(&trainer), id(&level), "u1")
            .await
            .unwrap();

        assert!(store.delete_record(&ScopedQuery::new(&TRAINERS, Scope::Tenant(tenant)), id(&trainer)).await.unwrap());

        let batches = store.select_records(&ScopedQuery::new(&BATCHES, Scope::Tenant(tenant))).await.unwrap();
        assert_eq!(batches[0]["trainer_ids"], json!([]));
        assert_eq!(id(&batches[0]), id(&batch));
        assert!(store.assignment_history(Relation::TrainerLevel, id(&trainer)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restricted_references_block_deletion() {
        let store = MemoryStore::new();
        let level = insert(&store, &LEVELS, Scope::Shared, json!({"name": "L1", "catalog_order": 1})).await;
        insert(&store, &COURSES, Scope::Shared, json!({"level_id": id(&level), "title": "c", "position": 0})).await;

        let result = store.delete_record(&ScopedQuery::new(&LEVELS, Scope::Shared), id(&level)).await;
        assert!(matches!(result, Err(DatabaseError::ForeignKeyViolation(_))));
        assert_eq!(store.select_records(&ScopedQuery::new(&LEVELS, Scope::Shared)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn section_cascade_removes_every_leaf() {
        let store = MemoryStore::new();
        let level = insert(&store, &LEVELS, Scope::Shared, json!({"name": "L1", "catalog_order": 1})).await;
        let course = insert(&store, &COURSES, Scope::Shared, json!({"level_id": id(&level), "title": "c"})).await;
        let section = insert(&store, &SECTIONS, Scope::Shared, json!({"course_id": id(&course), "title": "s"})).await;
        let leaf = json!({"course_id": id(&course), "section_id": id(&section), "title": "x"});
        for spec in [&LESSONS, &LESSONS, &QUIZZES, &COURSE_ASSIGNMENTS] {
            insert(&store, spec, Scope::Shared, leaf.clone()).await;
        }

        let deletion = store.delete_section_cascade(id(&section)).await.unwrap().unwrap();
        assert_eq!(
            deletion,
            SectionDeletion {
                lessons: 2,
                quizzes: 1,
                course_assignments: 1
            }
        );
        for spec in [&LESSONS, &QUIZZES, &COURSE_ASSIGNMENTS, &SECTIONS] {
            assert!(store.select_records(&ScopedQuery::new(spec, Scope::Shared)).await.unwrap().is_empty());
        }
        assert!(store.delete_section_cascade(id(&section)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reactivation_reuses_the_row() {
        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();
        let trainer = insert(&store, &TRAINERS, Scope::Tenant(tenant), json!({"name": "t"})).await;
        let level = insert(&store, &LEVELS, Scope::Shared, json!({"name": "L1", "catalog_order": 1})).await;
        let (t, l) = (id(&trainer), id(&level));

        let first = store.activate_assignment(Relation::TrainerLevel, t, l, "u1").await.unwrap();
        let off = store.deactivate_assignment(Relation::TrainerLevel, t, l).await.unwrap().unwrap();
        assert!(!off.active);
        let stamped = off.unassigned_at;
        assert!(stamped.is_some());

        // a second unassign keeps the original timestamp
        let again = store.deactivate_assignment(Relation::TrainerLevel, t, l).await.unwrap().unwrap();
        assert_eq!(again.unassigned_at, stamped);

        let back = store.activate_assignment(Relation::TrainerLevel, t, l, "u2").await.unwrap();
        assert_eq!(back.id, first.id);
        assert!(back.active && back.unassigned_at.is_none());
        assert_eq!(back.assigned_by, "u2");
        assert_eq!(store.assignment_history(Relation::TrainerLevel, t).await.unwrap().len(), 1);
    }

    #[test]
    fn nulls_sort_last() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!("a")), Some(&json!("b"))), Ordering::Less);
    }

    #[test]
    fn content_kinds_map_to_leaf_tables() {
        assert_eq!(ContentKind::Lesson.resource(), ResourceKind::Lessons);
        assert_eq!(ContentKind::for_resource(ResourceKind::Quizzes), None);
    }
}
