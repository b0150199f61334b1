use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Principal;
use crate::config::AppConfig;
use crate::database::store::record_id;
use crate::database::{MemoryStore, Scope, ScopedQuery, Store};
use crate::resources::{ResourceKind, ResourceSpec, COORDINATORS, COURSES, LESSONS, LEVELS, QUIZZES, SECTIONS};
use crate::services::{GatePolicy, RequestContext, ResourceAccessor, TenantDirectory};

/// Test utilities over an in-memory store with the development configuration
pub struct TestContext {
    store: MemoryStore,
    policy: GatePolicy,
    config: AppConfig,
}

/// Ids of a one-section course with one lesson and one quiz
#[derive(Debug, Clone, Copy)]
pub struct TestCourse {
    pub course: Uuid,
    pub section: Uuid,
    pub lesson: Uuid,
    pub quiz: Uuid,
}

impl TestContext {
    pub async fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            policy: GatePolicy::default(),
            config: AppConfig::development(),
        }
    }

    pub fn store(&self) -> &dyn Store {
        &self.store
    }

    pub fn accessor(&self) -> ResourceAccessor<'_> {
        ResourceAccessor::new(&self.store, &self.policy, &self.config.api)
    }

    /// A tenant for `org` whose caller is `user`, without any membership rows
    pub async fn fresh_school(&self, org: &str, user: &str) -> RequestContext {
        let tenant = TenantDirectory::new(&self.store, &self.config.tenancy.placeholder_name)
            .resolve(org, None)
            .await
            .expect("resolve tenant");
        RequestContext::new(
            Principal {
                external_user_id: user.to_string(),
                external_org_id: Some(org.to_string()),
                org_name: None,
                org_role: None,
            },
            tenant,
        )
    }

    /// A tenant whose caller `coordinator` holds the coordinator record
    pub async fn school(&self, org: &str, coordinator: &str) -> RequestContext {
        let mut ctx = self.fresh_school(org, coordinator).await;
        ctx.principal.org_role = Some(self.config.security.coordinator_org_role.clone());
        self.insert(
            &COORDINATORS,
            Scope::Tenant(ctx.tenant_id()),
            json!({"name": coordinator, "external_user_id": coordinator}),
        )
        .await;
        ctx
    }

    /// Another user in the same tenant, with no role records
    pub fn member_of(&self, ctx: &RequestContext, user: &str) -> RequestContext {
        let mut other = ctx.clone();
        other.principal.external_user_id = user.to_string();
        other.principal.org_role = None;
        other
    }

    /// Creates through the accessor, so gates and validation apply
    pub async fn create(&self, ctx: &RequestContext, kind: ResourceKind, payload: Value) -> Uuid {
        let row = self
            .accessor()
            .create_for_tenant(ctx, kind, payload)
            .await
            .unwrap_or_else(|e| panic!("create {kind}: {e}"));
        record_id(&row).expect("created row has an id")
    }

    pub async fn level(&self, name: &str, catalog_order: i64) -> Uuid {
        self.insert(&LEVELS, Scope::Shared, json!({"name": name, "catalog_order": catalog_order}))
            .await
    }

    pub async fn course_with_lesson(&self) -> TestCourse {
        let level = self.level(&format!("level-{}", Uuid::new_v4().simple()), 1).await;
        let course = self
            .insert(&COURSES, Scope::Shared, json!({"level_id": level, "title": "Course", "position": 0}))
            .await;
        let section = self
            .insert(&SECTIONS, Scope::Shared, json!({"course_id": course, "title": "Intro", "position": 0}))
            .await;
        let leaf = json!({"course_id": course, "section_id": section, "title": "Leaf", "position": 0});
        let lesson = self.insert(&LESSONS, Scope::Shared, leaf.clone()).await;
        let quiz = self.insert(&QUIZZES, Scope::Shared, leaf).await;
        TestCourse {
            course,
            section,
            lesson,
            quiz,
        }
    }

    /// Writes straight to the store, bypassing gates
    async fn insert(&self, spec: &'static ResourceSpec, scope: Scope, values: Value) -> Uuid {
        let values = values.as_object().cloned().expect("object payload");
        let row = self
            .store
            .insert_record(&ScopedQuery::new(spec, scope), values)
            .await
            .expect("insert")
            .expect("owned insert");
        record_id(&row).expect("inserted row has an id")
    }
}
