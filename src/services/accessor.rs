//! The one read/write path for every resource.
//!
//! Every lookup runs under the caller's tenant scope and every mutation first
//! loads the target through that scope, so a row whose ownership chain ends
//! at another tenant is indistinguishable from a missing one.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::RequestContext;
use super::course_tree;
use super::error::{ServiceError, ServiceResult};
use super::role_gate::{Gate, GatePolicy, Mutation};
use crate::config::ApiConfig;
use crate::database::{DatabaseError, Filter, Record, Scope, ScopedQuery, SectionDeletion, Store};
use crate::resources::{
    Column, ColumnType, DefaultValue, DeleteStrategy, ResourceKind, ResourceSpec, IDENTITY_COLUMN, SYSTEM_COLUMNS,
};

/// Result of a successful delete
#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    /// Leaf counts, for resources that cascade structurally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<SectionDeletion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

pub struct ResourceAccessor<'a> {
    store: &'a dyn Store,
    policy: &'a GatePolicy,
    paging: &'a ApiConfig,
}

impl<'a> ResourceAccessor<'a> {
    pub fn new(store: &'a dyn Store, policy: &'a GatePolicy, paging: &'a ApiConfig) -> Self {
        Self { store, policy, paging }
    }

    /// Rows visible to the tenant. `params` carries `limit`, `offset` and
    /// equality filters on allow-listed columns.
    pub async fn list_for_tenant(
        &self,
        ctx: &RequestContext,
        kind: ResourceKind,
        params: &HashMap<String, String>,
    ) -> ServiceResult<Vec<Record>> {
        let spec = kind.spec();
        let query = self.list_query(ctx, spec, params)?;

        match self.store.select_records(&query).await {
            Ok(rows) => Ok(rows),
            Err(DatabaseError::UndefinedTable(detail)) => {
                warn!("Listing {} before its table exists, returning empty: {}", spec.table, detail);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_if_owned(&self, ctx: &RequestContext, kind: ResourceKind, id: Uuid) -> ServiceResult<Record> {
        let spec = kind.spec();
        self.store
            .select_record(&ScopedQuery::new(spec, ctx.scope_for(spec)), id)
            .await?
            .ok_or_else(|| ServiceError::not_found(kind))
    }

    /// The caller's own row of a membership resource in this tenant, if any
    pub async fn find_own(&self, ctx: &RequestContext, kind: ResourceKind) -> ServiceResult<Option<Record>> {
        let spec = kind.spec();
        let Some(column) = spec.column(IDENTITY_COLUMN) else {
            return Ok(None);
        };
        let mut query = ScopedQuery::new(spec, ctx.scope_for(spec));
        query.filters.push(Filter {
            column,
            value: ctx.user_id().to_string(),
        });
        query.limit = Some(1);

        match self.store.select_records(&query).await {
            Ok(rows) => Ok(rows.into_iter().next()),
            Err(DatabaseError::UndefinedTable(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_for_tenant(&self, ctx: &RequestContext, kind: ResourceKind, payload: Value) -> ServiceResult<Record> {
        self.policy.enforce(self.store, ctx, kind, Mutation::Create, None).await?;

        let spec = kind.spec();
        let mut values = validate(spec, payload, Mode::Create)?;
        // An explicit identity may only name the caller
        let claims_identity = values.get(IDENTITY_COLUMN).is_some_and(|v| !v.is_null());
        if self.policy.gate(kind, Mutation::Create) == Gate::SelfService || claims_identity {
            stamp_identity(ctx, kind, &mut values)?;
        }
        self.insert(ctx, spec, values).await
    }

    /// Creates the caller's own row, stamped with their external user id. Used by membership sync.
    pub(crate) async fn create_as_self(&self, ctx: &RequestContext, kind: ResourceKind, payload: Value) -> ServiceResult<Record> {
        let spec = kind.spec();
        let mut values = validate(spec, payload, Mode::Create)?;
        stamp_identity(ctx, kind, &mut values)?;
        self.insert(ctx, spec, values).await
    }

    pub async fn update_if_owned(
        &self,
        ctx: &RequestContext,
        kind: ResourceKind,
        id: Uuid,
        patch: Value,
    ) -> ServiceResult<Record> {
        let existing = self.get_if_owned(ctx, kind, id).await?;
        self.policy.enforce(self.store, ctx, kind, Mutation::Update, Some(&existing)).await?;

        let spec = kind.spec();
        let values = validate(spec, patch, Mode::Update)?;
        self.check_references(ctx, spec, &values).await?;
        self.check_parent_match(spec, &values, Some(&existing)).await?;

        let updated = self
            .store
            .update_record(&ScopedQuery::new(spec, ctx.scope_for(spec)), id, values)
            .await
            .map_err(|e| write_error(spec, e))?;
        updated.ok_or_else(|| ServiceError::not_found(kind))
    }

    pub async fn delete_if_owned(&self, ctx: &RequestContext, kind: ResourceKind, id: Uuid) -> ServiceResult<Deleted> {
        let existing = self.get_if_owned(ctx, kind, id).await?;
        self.policy.enforce(self.store, ctx, kind, Mutation::Delete, Some(&existing)).await?;

        let spec = kind.spec();
        if spec.delete == DeleteStrategy::SectionCascade {
            let removed = course_tree::delete_section(self.store, id).await?;
            return Ok(Deleted {
                id,
                removed: Some(removed),
            });
        }

        let deleted = self
            .store
            .delete_record(&ScopedQuery::new(spec, ctx.scope_for(spec)), id)
            .await
            .map_err(|e| match e {
                DatabaseError::ForeignKeyViolation(constraint) => {
                    debug!("Delete of {} {} blocked by {}", spec.table, id, constraint);
                    ServiceError::Conflict(format!("This {} is still referenced by other records", kind.noun()))
                }
                other => other.into(),
            })?;

        if !deleted {
            return Err(ServiceError::not_found(kind));
        }
        info!("Deleted {} {} in tenant {}", kind.noun(), id, ctx.tenant_id());
        Ok(Deleted { id, removed: None })
    }

    async fn insert(&self, ctx: &RequestContext, spec: &'static ResourceSpec, values: Record) -> ServiceResult<Record> {
        self.check_references(ctx, spec, &values).await?;
        self.check_parent_match(spec, &values, None).await?;

        let created = self
            .store
            .insert_record(&ScopedQuery::new(spec, ctx.scope_for(spec)), values)
            .await
            .map_err(|e| write_error(spec, e))?;

        // References were verified above; losing the chain here means a parent vanished mid-request
        let record = created.ok_or_else(|| match spec.references.first() {
            Some(parent) => ServiceError::not_found(parent.target),
            None => ServiceError::not_found(spec.kind),
        })?;
        debug!("Created {} in tenant {}", spec.kind.noun(), ctx.tenant_id());
        Ok(record)
    }

    fn list_query(
        &self,
        ctx: &RequestContext,
        spec: &'static ResourceSpec,
        params: &HashMap<String, String>,
    ) -> ServiceResult<ScopedQuery> {
        let mut query = ScopedQuery::new(spec, ctx.scope_for(spec));
        let mut field_errors = BTreeMap::new();

        query.limit = Some(self.paging.default_page_size.min(self.paging.max_page_size));
        for (key, raw) in params {
            match key.as_str() {
                "limit" => match raw.parse::<u32>() {
                    Ok(limit) if limit > 0 => query.limit = Some(limit.min(self.paging.max_page_size)),
                    _ => {
                        field_errors.insert(key.clone(), "must be a positive integer".to_string());
                    }
                },
                "offset" => match raw.parse::<u32>() {
                    Ok(offset) => query.offset = Some(offset),
                    Err(_) => {
                        field_errors.insert(key.clone(), "must be a non-negative integer".to_string());
                    }
                },
                name => match spec.column(name).filter(|c| c.filterable) {
                    Some(column) => match canonical_filter_value(column, raw) {
                        Ok(value) => query.filters.push(Filter { column, value }),
                        Err(problem) => {
                            field_errors.insert(key.clone(), problem);
                        }
                    },
                    None => {
                        field_errors.insert(key.clone(), "is not a filterable field".to_string());
                    }
                },
            }
        }

        if !field_errors.is_empty() {
            return Err(ServiceError::Invalid {
                message: "Invalid list parameters".into(),
                field_errors,
            });
        }
        Ok(query)
    }

    /// Every referenced row must be visible to the caller
    async fn check_references(&self, ctx: &RequestContext, spec: &ResourceSpec, values: &Record) -> ServiceResult<()> {
        for reference in spec.references {
            let ids: Vec<Uuid> = match values.get(reference.column) {
                Some(Value::String(s)) => s.parse().into_iter().collect(),
                Some(Value::Array(items)) => items.iter().filter_map(|i| i.as_str()?.parse().ok()).collect(),
                _ => continue,
            };
            let target = reference.target.spec();
            let query = ScopedQuery::new(target, ctx.scope_for(target));
            for id in ids {
                if self.store.select_record(&query, id).await?.is_none() {
                    debug!("{}.{} references unknown {} {}", spec.table, reference.column, target.table, id);
                    return Err(ServiceError::not_found(reference.target));
                }
            }
        }
        Ok(())
    }

    /// A leaf's section must sit in the leaf's course
    async fn check_parent_match(&self, spec: &ResourceSpec, values: &Record, existing: Option<&Record>) -> ServiceResult<()> {
        let Some(rule) = spec.parent_match else {
            return Ok(());
        };
        if existing.is_some() && !values.contains_key(rule.column) && !values.contains_key(rule.local_column) {
            return Ok(());
        }

        let current = |column: &str| -> Option<Value> {
            values
                .get(column)
                .or_else(|| existing.and_then(|row| row.get(column)))
                .filter(|v| !v.is_null())
                .cloned()
        };
        let Some(parent_id) = current(rule.column).and_then(|v| v.as_str()?.parse::<Uuid>().ok()) else {
            return Ok(());
        };

        let parent_spec = rule.parent.spec();
        let parent = self
            .store
            .select_record(&ScopedQuery::new(parent_spec, Scope::Shared), parent_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(rule.parent))?;

        if parent.get(rule.parent_column).cloned() != current(rule.local_column) {
            return Err(ServiceError::invalid_field(
                rule.column,
                format!("{} belongs to a different {}", rule.parent.noun(), rule.local_column.trim_end_matches("_id")),
            ));
        }
        Ok(())
    }
}

fn stamp_identity(ctx: &RequestContext, kind: ResourceKind, values: &mut Record) -> ServiceResult<()> {
    match values.get(IDENTITY_COLUMN) {
        Some(Value::String(other)) if other != ctx.user_id() => Err(ServiceError::Forbidden(format!(
            "A {} can only be created for yourself",
            kind.noun()
        ))),
        _ => {
            values.insert(IDENTITY_COLUMN.into(), Value::String(ctx.user_id().to_string()));
            Ok(())
        }
    }
}

fn write_error(spec: &ResourceSpec, err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::UniqueViolation(constraint) => {
            debug!("Unique violation on {}: {}", spec.table, constraint);
            let message = spec
                .conflict_message
                .map(str::to_string)
                .unwrap_or_else(|| format!("This {} already exists", spec.kind.noun()));
            ServiceError::Conflict(message)
        }
        DatabaseError::ForeignKeyViolation(constraint) => {
            debug!("Foreign key violation on {}: {}", spec.table, constraint);
            ServiceError::Conflict(format!("A record referenced by this {} was removed", spec.kind.noun()))
        }
        DatabaseError::CheckViolation(constraint) => ServiceError::invalid(format!("Constraint {constraint} failed")),
        other => other.into(),
    }
}

/// Checks and normalizes a request body against the column allow-list
fn validate(spec: &ResourceSpec, payload: Value, mode: Mode) -> ServiceResult<Record> {
    let Value::Object(fields) = payload else {
        return Err(ServiceError::invalid("Request body must be a JSON object"));
    };

    let mut values = Record::new();
    let mut field_errors = BTreeMap::new();

    for (name, value) in fields {
        if SYSTEM_COLUMNS.contains(&name.as_str()) {
            field_errors.insert(name, "is managed by the server".to_string());
            continue;
        }
        let Some(column) = spec.column(&name) else {
            field_errors.insert(name, "is not a known field".to_string());
            continue;
        };
        if mode == Mode::Update && !column.patchable {
            field_errors.insert(name, "cannot be changed after creation".to_string());
            continue;
        }
        match coerce(column, value) {
            Ok(Value::Null) if column.required => {
                field_errors.insert(name, "is required".to_string());
            }
            Ok(value) => {
                values.insert(name, value);
            }
            Err(problem) => {
                field_errors.insert(name, problem);
            }
        }
    }

    if mode == Mode::Create {
        for column in spec.columns {
            if values.contains_key(column.name) || field_errors.contains_key(column.name) {
                continue;
            }
            match column.default {
                Some(default) => {
                    values.insert(column.name.into(), default_value(default));
                }
                None if column.required => {
                    field_errors.insert(column.name.to_string(), "is required".to_string());
                }
                None => {}
            }
        }
    }

    if !field_errors.is_empty() {
        return Err(ServiceError::Invalid {
            message: format!("Invalid {} fields", spec.kind.noun()),
            field_errors,
        });
    }
    if mode == Mode::Update && values.is_empty() {
        return Err(ServiceError::invalid("No fields to update"));
    }
    Ok(values)
}

fn default_value(default: DefaultValue) -> Value {
    match default {
        DefaultValue::Text(s) => Value::String(s.to_string()),
        DefaultValue::Integer(n) => Value::from(n),
        DefaultValue::EmptyList => Value::Array(Vec::new()),
    }
}

fn parse_uuid(s: &str) -> Option<String> {
    s.trim().parse::<Uuid>().ok().map(|u| u.to_string())
}

fn coerce(column: &Column, value: Value) -> Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let coerced = match (column.ty, value) {
        (ColumnType::Uuid, Value::String(s)) => parse_uuid(&s).map(Value::String),
        (ColumnType::UuidList, Value::Array(items)) => {
            let mut ids: Vec<String> = Vec::with_capacity(items.len());
            for item in &items {
                let id = item.as_str().and_then(parse_uuid).ok_or("must be an array of UUIDs")?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Some(Value::Array(ids.into_iter().map(Value::String).collect()))
        }
        (ColumnType::Text, Value::String(s)) => Some(Value::String(s)),
        (ColumnType::Integer, Value::Number(n)) => n.as_i64().map(Value::from),
        (ColumnType::Number, Value::Number(n)) => Some(Value::Number(n)),
        (ColumnType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (ColumnType::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| Value::String(t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Micros, false))),
        (ColumnType::Json, v) => Some(v),
        _ => None,
    };

    let coerced = coerced.ok_or_else(|| type_problem(column.ty).to_string())?;
    if let (Some(allowed), Some(s)) = (column.one_of, coerced.as_str()) {
        if !allowed.contains(&s) {
            return Err(format!("must be one of: {}", allowed.join(", ")));
        }
    }
    Ok(coerced)
}

fn type_problem(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Uuid => "must be a UUID",
        ColumnType::UuidList => "must be an array of UUIDs",
        ColumnType::Text => "must be a string",
        ColumnType::Integer => "must be an integer",
        ColumnType::Number => "must be a number",
        ColumnType::Boolean => "must be a boolean",
        ColumnType::Timestamp => "must be an RFC 3339 timestamp",
        ColumnType::Json => "must be JSON",
    }
}

/// Query-string filter values in the text form the store compares against
fn canonical_filter_value(column: &Column, raw: &str) -> Result<String, String> {
    match column.ty {
        ColumnType::Uuid | ColumnType::UuidList => parse_uuid(raw).ok_or_else(|| "must be a UUID".to_string()),
        ColumnType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(|n| n.to_string())
            .map_err(|_| "must be an integer".to_string()),
        ColumnType::Boolean => match raw.trim() {
            "true" | "false" => Ok(raw.trim().to_string()),
            _ => Err("must be true or false".to_string()),
        },
        _ => match column.one_of {
            Some(allowed) if !allowed.contains(&raw) => Err(format!("must be one of: {}", allowed.join(", "))),
            _ => Ok(raw.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{BATCHES, COORDINATORS, LESSONS, SESSIONS};
    use serde_json::json;

    #[test]
    fn create_applies_defaults_and_requires_fields() {
        let values = validate(&BATCHES, json!({"name": "Morning"}), Mode::Create).unwrap();
        assert_eq!(values["status"], json!("pending"));
        assert_eq!(values["trainer_ids"], json!([]));

        let err = validate(&BATCHES, json!({"status": "active"}), Mode::Create).unwrap_err();
        match err {
            ServiceError::Invalid { field_errors, .. } => assert_eq!(field_errors["name"], "is required"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn system_unknown_and_fixed_fields_are_rejected() {
        let err = validate(&SESSIONS, json!({"tenant_id": "x", "colour": "red"}), Mode::Update).unwrap_err();
        let ServiceError::Invalid { field_errors, .. } = err else {
            panic!("expected invalid");
        };
        assert!(field_errors.contains_key("tenant_id"));
        assert!(field_errors.contains_key("colour"));

        let err = validate(&COORDINATORS, json!({"external_user_id": "u2"}), Mode::Update).unwrap_err();
        assert!(matches!(err, ServiceError::Invalid { field_errors, .. } if field_errors.contains_key("external_user_id")));
    }

    #[test]
    fn values_are_normalized() {
        let id = Uuid::new_v4();
        let values = validate(
            &SESSIONS,
            json!({
                "batch_id": id.to_string().to_uppercase(),
                "title": "Kickoff",
                "scheduled_at": "2024-03-01T09:00:00+02:00",
            }),
            Mode::Create,
        )
        .unwrap();
        assert_eq!(values["batch_id"], json!(id.to_string()));
        assert_eq!(values["scheduled_at"], json!("2024-03-01T07:00:00.000000+00:00"));
    }

    #[test]
    fn uuid_lists_are_deduplicated() {
        let id = Uuid::new_v4().to_string();
        let values = validate(&BATCHES, json!({"name": "b", "student_ids": [id, id]}), Mode::Create).unwrap();
        assert_eq!(values["student_ids"].as_array().unwrap().len(), 1);
        assert!(validate(&BATCHES, json!({"name": "b", "student_ids": ["nope"]}), Mode::Create).is_err());
    }

    #[test]
    fn enumerations_and_types_are_checked() {
        assert!(validate(&BATCHES, json!({"name": "b", "status": "paused"}), Mode::Create).is_err());
        assert!(validate(&LESSONS, json!({"position": "first"}), Mode::Update).is_err());
        assert!(validate(&LESSONS, json!({"position": 2}), Mode::Update).is_ok());
        assert!(validate(&LESSONS, json!([]), Mode::Update).is_err());
        assert!(validate(&LESSONS, json!({}), Mode::Update).is_err());
    }

    #[test]
    fn filter_values_are_canonical() {
        let status = BATCHES.column("status").unwrap();
        assert_eq!(canonical_filter_value(status, "active").unwrap(), "active");
        assert!(canonical_filter_value(status, "paused").is_err());

        let trainers = BATCHES.column("trainer_ids").unwrap();
        let id = Uuid::new_v4();
        assert_eq!(canonical_filter_value(trainers, &id.to_string().to_uppercase()).unwrap(), id.to_string());
    }

    #[tokio::test]
    async fn open_creates_cannot_claim_another_identity() {
        let t = crate::testing::TestContext::new().await;
        let school = t.school("org_a", "coord_a").await;
        let accessor = t.accessor();

        let err = accessor
            .create_for_tenant(&school, ResourceKind::Trainers, json!({"name": "M", "external_user_id": "victim"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let roster = accessor
            .create_for_tenant(&school, ResourceKind::Students, json!({"name": "Roster only"}))
            .await
            .unwrap();
        assert!(roster.get(IDENTITY_COLUMN).map_or(true, Value::is_null));
    }
}
