use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    ActorKey, CompletionFact, ContentRef, Level, LevelAssignment, NewAttempt, QuizAttempt, Relation, Tenant,
};
use crate::resources::{Column, ColumnType, ResourceSpec};

/// A generic resource row as a JSON object keyed by column name
pub type Record = Map<String, Value>;

/// The tenant boundary a query runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Tenant(Uuid),
    /// Only valid for shared catalog resources
    Shared,
}

/// Equality filter on an allow-listed column. Uuid-list columns match by membership.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: &'static Column,
    /// Canonical text form of the value (lowercase uuid, decimal integer, `true`/`false`)
    pub value: String,
}

impl Filter {
    pub fn matches(&self, row: &Record) -> bool {
        match (self.column.ty, row.get(self.column.name)) {
            (ColumnType::UuidList, Some(Value::Array(items))) => {
                items.iter().any(|item| item.as_str() == Some(self.value.as_str()))
            }
            (_, Some(Value::String(s))) => *s == self.value,
            (_, Some(Value::Null)) | (_, None) => false,
            (_, Some(other)) => other.to_string() == self.value,
        }
    }
}

/// A read or write against one resource table, already bound to a tenant scope
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    pub spec: &'static ResourceSpec,
    pub scope: Scope,
    pub filters: Vec<Filter>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ScopedQuery {
    pub fn new(spec: &'static ResourceSpec, scope: Scope) -> Self {
        Self {
            spec,
            scope,
            filters: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// The tenant every returned row must belong to, or `None` for shared resources.
    /// A tenant-owned resource queried without a tenant is a programming error.
    pub fn tenant(&self) -> Result<Option<Uuid>, DatabaseError> {
        match (self.spec.is_tenant_owned(), self.scope) {
            (false, _) => Ok(None),
            (true, Scope::Tenant(id)) => Ok(Some(id)),
            (true, Scope::Shared) => Err(DatabaseError::ScopeRequired(self.spec.table)),
        }
    }
}

/// Leaf counts removed together with a section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionDeletion {
    pub lessons: u64,
    pub quizzes: u64,
    pub course_assignments: u64,
}

/// The only datastore seam. Implementations enforce the same unique and
/// referential constraints and apply multi-row writes atomically.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Fails when the backing store cannot run multi-statement transactions
    async fn verify_transactions(&self) -> Result<(), DatabaseError>;

    async fn apply_schema(&self) -> Result<(), DatabaseError>;

    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DatabaseError>;
    async fn tenant_by_external_org(&self, external_org_id: &str) -> Result<Option<Tenant>, DatabaseError>;
    async fn insert_tenant(&self, external_org_id: Option<&str>, name: &str) -> Result<Tenant, DatabaseError>;
    async fn set_tenant_binding(&self, id: Uuid, external_org_id: Option<&str>) -> Result<Option<Tenant>, DatabaseError>;
    async fn rename_tenant(&self, id: Uuid, name: &str) -> Result<Option<Tenant>, DatabaseError>;
    async fn list_tenants(&self) -> Result<Vec<Tenant>, DatabaseError>;

    async fn select_records(&self, query: &ScopedQuery) -> Result<Vec<Record>, DatabaseError>;

    /// One row by id, only when owned under the query's scope
    async fn select_record(&self, query: &ScopedQuery, id: Uuid) -> Result<Option<Record>, DatabaseError>;

    /// Returns `None` when the row's ownership chain does not reach the query's tenant
    async fn insert_record(&self, query: &ScopedQuery, values: Record) -> Result<Option<Record>, DatabaseError>;

    async fn update_record(&self, query: &ScopedQuery, id: Uuid, patch: Record) -> Result<Option<Record>, DatabaseError>;

    /// Deletes one owned row, pruning uuid-list references to it in the same transaction
    async fn delete_record(&self, query: &ScopedQuery, id: Uuid) -> Result<bool, DatabaseError>;

    /// Removes a section and every leaf under it in one transaction
    async fn delete_section_cascade(&self, section_id: Uuid) -> Result<Option<SectionDeletion>, DatabaseError>;

    async fn activate_assignment(
        &self,
        relation: Relation,
        subject_id: Uuid,
        level_id: Uuid,
        assigned_by: &str,
    ) -> Result<LevelAssignment, DatabaseError>;
    async fn deactivate_assignment(
        &self,
        relation: Relation,
        subject_id: Uuid,
        level_id: Uuid,
    ) -> Result<Option<LevelAssignment>, DatabaseError>;
    async fn assignment_history(&self, relation: Relation, subject_id: Uuid) -> Result<Vec<LevelAssignment>, DatabaseError>;
    async fn active_levels(&self, relation: Relation, subject_id: Uuid) -> Result<Vec<Level>, DatabaseError>;

    async fn upsert_completion(
        &self,
        content: &ContentRef,
        actor: &ActorKey,
        completed: bool,
    ) -> Result<CompletionFact, DatabaseError>;
    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, DatabaseError>;
    async fn completed_content_ids(&self, course_id: Uuid, actor: &ActorKey) -> Result<Vec<Uuid>, DatabaseError>;
    async fn latest_attempt(
        &self,
        course_id: Uuid,
        actor: &ActorKey,
        quiz_id: Option<Uuid>,
    ) -> Result<Option<QuizAttempt>, DatabaseError>;
}

/// Reads the `id` column of a record
pub fn record_id(record: &Record) -> Option<Uuid> {
    record_uuid(record, "id")
}

pub fn record_uuid(record: &Record, column: &str) -> Option<Uuid> {
    record.get(column)?.as_str()?.parse().ok()
}
