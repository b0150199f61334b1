//! SQL text builders for descriptor-driven statements.
//!
//! Identifiers only ever come from static resource descriptors; every value
//! travels as a bind parameter.

use serde_json::Value;
use uuid::Uuid;

use super::models::ActorKey;
use super::store::ScopedQuery;
use crate::resources::{ColumnType, Ownership, ResourceSpec};

/// A positional bind value
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Uuid(Uuid),
    Text(String),
    Int(i64),
    Json(Value),
}

/// A statement and its binds, in `$n` order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Bind>,
}

pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Predicate limiting `alias` rows to those owned by the tenant bound at `$param`.
/// Through-owned rows are checked by joining up the chain, never by a column on the row itself.
pub fn ownership_predicate(spec: &ResourceSpec, alias: &str, param: usize) -> Option<String> {
    match spec.ownership {
        Ownership::Shared => None,
        Ownership::Direct => Some(format!("{alias}.\"tenant_id\" = ${param}")),
        Ownership::Through(hops) => {
            let mut from = String::new();
            for (i, hop) in hops.iter().enumerate() {
                let table = quote(hop.parent.spec().table);
                if i == 0 {
                    from.push_str(&format!("{table} p0"));
                } else {
                    // hop i's column lives on the previous parent
                    from.push_str(&format!(" JOIN {table} p{i} ON p{i}.\"id\" = p{}.{}", i - 1, quote(hop.column)));
                }
            }
            let last = hops.len() - 1;
            Some(format!(
                "EXISTS (SELECT 1 FROM {from} WHERE p0.\"id\" = {alias}.{} AND p{last}.\"tenant_id\" = ${param})",
                quote(hops[0].column)
            ))
        }
    }
}

fn order_clause(spec: &ResourceSpec) -> String {
    let mut columns: Vec<String> = spec.order_by.iter().map(|c| format!("r.{}", quote(c))).collect();
    for tiebreak in ["created_at", "id"] {
        if !spec.order_by.contains(&tiebreak) {
            columns.push(format!("r.{}", quote(tiebreak)));
        }
    }
    columns.join(", ")
}

/// Scoped SELECT returning one `row_to_json` value per row. `id` narrows to a single row.
pub fn select(query: &ScopedQuery, tenant: Option<Uuid>, id: Option<Uuid>) -> Statement {
    let spec = query.spec;
    let mut binds = Vec::new();
    let mut clauses = Vec::new();

    if let Some(tenant) = tenant {
        binds.push(Bind::Uuid(tenant));
        if let Some(predicate) = ownership_predicate(spec, "r", binds.len()) {
            clauses.push(predicate);
        }
    }
    if let Some(id) = id {
        binds.push(Bind::Uuid(id));
        clauses.push(format!("r.\"id\" = ${}", binds.len()));
    }
    for filter in &query.filters {
        let column = quote(filter.column.name);
        if filter.column.ty == ColumnType::UuidList {
            // Filter values are canonicalized before they reach the store
            match filter.value.parse::<Uuid>() {
                Ok(value) => binds.push(Bind::Uuid(value)),
                Err(_) => {
                    clauses.push("FALSE".to_string());
                    continue;
                }
            }
            clauses.push(format!("${} = ANY(r.{column})", binds.len()));
        } else {
            binds.push(Bind::Text(filter.value.clone()));
            clauses.push(format!("r.{column}::text = ${}", binds.len()));
        }
    }

    let mut sql = format!("SELECT row_to_json(r) AS row FROM {} r", quote(spec.table));
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_clause(spec));
    if let Some(limit) = query.limit {
        binds.push(Bind::Int(i64::from(limit)));
        sql.push_str(&format!(" LIMIT ${}", binds.len()));
    }
    if let Some(offset) = query.offset {
        binds.push(Bind::Int(i64::from(offset)));
        sql.push_str(&format!(" OFFSET ${}", binds.len()));
    }

    Statement { sql, binds }
}

/// INSERT of the given columns from a JSON document. For through-owned rows the
/// insert only happens when the new row's chain reaches `tenant`.
pub fn insert(spec: &ResourceSpec, columns: &[&str], document: Value, tenant: Option<Uuid>) -> Statement {
    let table = quote(spec.table);
    let names: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    let values: Vec<String> = columns.iter().map(|c| format!("p.{}", quote(c))).collect();

    let mut binds = vec![Bind::Json(document)];
    let mut sql = format!(
        "INSERT INTO {table} AS r ({}) SELECT {} FROM jsonb_populate_record(NULL::{table}, $1::jsonb) AS p",
        names.join(", "),
        values.join(", ")
    );
    if let (Ownership::Through(_), Some(tenant)) = (spec.ownership, tenant) {
        binds.push(Bind::Uuid(tenant));
        if let Some(predicate) = ownership_predicate(spec, "p", binds.len()) {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
    }
    sql.push_str(" RETURNING row_to_json(r) AS row");
    Statement { sql, binds }
}

/// UPDATE of the patched columns on one owned row
pub fn update(spec: &ResourceSpec, columns: &[&str], document: Value, id: Uuid, tenant: Option<Uuid>) -> Statement {
    let table = quote(spec.table);
    let mut assignments: Vec<String> = columns
        .iter()
        .map(|c| format!("{} = p.{}", quote(c), quote(c)))
        .collect();
    assignments.push("\"updated_at\" = now()".to_string());

    let mut binds = vec![Bind::Json(document), Bind::Uuid(id)];
    let mut sql = format!(
        "UPDATE {table} AS r SET {} FROM jsonb_populate_record(NULL::{table}, $1::jsonb) AS p WHERE r.\"id\" = $2",
        assignments.join(", ")
    );
    if let Some(tenant) = tenant {
        binds.push(Bind::Uuid(tenant));
        if let Some(predicate) = ownership_predicate(spec, "r", binds.len()) {
            sql.push_str(" AND ");
            sql.push_str(&predicate);
        }
    }
    sql.push_str(" RETURNING row_to_json(r) AS row");
    Statement { sql, binds }
}

pub fn delete(spec: &ResourceSpec, id: Uuid, tenant: Option<Uuid>) -> Statement {
    let mut binds = vec![Bind::Uuid(id)];
    let mut sql = format!("DELETE FROM {} AS r WHERE r.\"id\" = $1", quote(spec.table));
    if let Some(tenant) = tenant {
        binds.push(Bind::Uuid(tenant));
        if let Some(predicate) = ownership_predicate(spec, "r", binds.len()) {
            sql.push_str(" AND ");
            sql.push_str(&predicate);
        }
    }
    sql.push_str(" RETURNING r.\"id\"");
    Statement { sql, binds }
}

/// Removes `$1` from a uuid-list column wherever it appears
pub fn prune(table: &str, column: &str) -> String {
    let column = quote(column);
    format!(
        "UPDATE {} SET {column} = array_remove({column}, $1), \"updated_at\" = now() WHERE $1 = ANY({column})",
        quote(table)
    )
}

/// Predicate selecting rows keyed by `actor`, with binds starting at `$first`
pub fn actor_predicate(actor: &ActorKey, first: usize) -> (String, Vec<Bind>) {
    match actor {
        ActorKey::Student { student_id, batch_id } => (
            format!(
                "student_id = ${} AND batch_id = ${} AND trainer_id IS NULL",
                first,
                first + 1
            ),
            vec![Bind::Uuid(*student_id), Bind::Uuid(*batch_id)],
        ),
        ActorKey::Trainer { trainer_id } => (
            format!("trainer_id = ${first} AND student_id IS NULL"),
            vec![Bind::Uuid(*trainer_id)],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::store::{Filter, Scope};
    use crate::resources::{BATCHES, LEVELS, SESSIONS, SUBMISSIONS, TRAINERS};
    use serde_json::json;

    #[test]
    fn direct_ownership_compares_the_tenant_column() {
        assert_eq!(
            ownership_predicate(&TRAINERS, "r", 1).as_deref(),
            Some("r.\"tenant_id\" = $1")
        );
        assert_eq!(ownership_predicate(&LEVELS, "r", 1), None);
    }

    #[test]
    fn through_ownership_joins_up_the_chain() {
        let single = ownership_predicate(&SESSIONS, "r", 2).unwrap();
        assert_eq!(
            single,
            "EXISTS (SELECT 1 FROM \"batches\" p0 WHERE p0.\"id\" = r.\"batch_id\" AND p0.\"tenant_id\" = $2)"
        );

        let double = ownership_predicate(&SUBMISSIONS, "r", 1).unwrap();
        assert_eq!(
            double,
            "EXISTS (SELECT 1 FROM \"assignments\" p0 JOIN \"batches\" p1 ON p1.\"id\" = p0.\"batch_id\" \
             WHERE p0.\"id\" = r.\"assignment_id\" AND p1.\"tenant_id\" = $1)"
        );
    }

    #[test]
    fn select_binds_tenant_filters_and_paging_in_order() {
        let tenant = Uuid::new_v4();
        let trainer = Uuid::new_v4();
        let mut query = ScopedQuery::new(&BATCHES, Scope::Tenant(tenant));
        query.filters.push(Filter {
            column: BATCHES.column("status").unwrap(),
            value: "active".into(),
        });
        query.filters.push(Filter {
            column: BATCHES.column("trainer_ids").unwrap(),
            value: trainer.to_string(),
        });
        query.limit = Some(10);
        query.offset = Some(20);

        let stmt = select(&query, Some(tenant), None);
        assert_eq!(
            stmt.sql,
            "SELECT row_to_json(r) AS row FROM \"batches\" r WHERE r.\"tenant_id\" = $1 \
             AND r.\"status\"::text = $2 AND $3 = ANY(r.\"trainer_ids\") \
             ORDER BY r.\"name\", r.\"created_at\", r.\"id\" LIMIT $4 OFFSET $5"
        );
        assert_eq!(
            stmt.binds,
            vec![
                Bind::Uuid(tenant),
                Bind::Text("active".into()),
                Bind::Uuid(trainer),
                Bind::Int(10),
                Bind::Int(20)
            ]
        );
    }

    #[test]
    fn shared_select_has_no_tenant_predicate() {
        let query = ScopedQuery::new(&LEVELS, Scope::Shared);
        let stmt = select(&query, None, Some(Uuid::nil()));
        assert!(stmt.sql.contains("WHERE r.\"id\" = $1"));
        assert!(stmt.sql.contains("ORDER BY r.\"catalog_order\", r.\"name\""));
        assert_eq!(stmt.binds.len(), 1);
    }

    #[test]
    fn through_insert_is_guarded_by_the_parent_chain() {
        let tenant = Uuid::new_v4();
        let stmt = insert(&SESSIONS, &["batch_id", "title"], json!({}), Some(tenant));
        assert!(stmt.sql.starts_with(
            "INSERT INTO \"sessions\" AS r (\"batch_id\", \"title\") SELECT p.\"batch_id\", p.\"title\" \
             FROM jsonb_populate_record(NULL::\"sessions\", $1::jsonb) AS p WHERE EXISTS"
        ));
        assert!(stmt.sql.contains("p0.\"id\" = p.\"batch_id\""));
        assert_eq!(stmt.binds[1], Bind::Uuid(tenant));
    }

    #[test]
    fn update_and_delete_check_ownership_of_the_existing_row() {
        let tenant = Uuid::new_v4();
        let id = Uuid::new_v4();
        let stmt = update(&TRAINERS, &["name"], json!({"name": "x"}), id, Some(tenant));
        assert!(stmt.sql.contains("SET \"name\" = p.\"name\", \"updated_at\" = now()"));
        assert!(stmt.sql.contains("WHERE r.\"id\" = $2 AND r.\"tenant_id\" = $3"));

        let stmt = delete(&SESSIONS, id, Some(tenant));
        assert!(stmt.sql.starts_with("DELETE FROM \"sessions\" AS r WHERE r.\"id\" = $1 AND EXISTS"));
        assert!(stmt.sql.ends_with("RETURNING r.\"id\""));
    }

    #[test]
    fn actor_predicates_never_mix_roles() {
        let (sql, binds) = actor_predicate(
            &ActorKey::Student {
                student_id: Uuid::nil(),
                batch_id: Uuid::nil(),
            },
            2,
        );
        assert_eq!(sql, "student_id = $2 AND batch_id = $3 AND trainer_id IS NULL");
        assert_eq!(binds.len(), 2);

        let (sql, _) = actor_predicate(&ActorKey::Trainer { trainer_id: Uuid::nil() }, 1);
        assert_eq!(sql, "trainer_id = $1 AND student_id IS NULL");
    }
}
