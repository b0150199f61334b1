#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use schoolops_api::auth::{generate_jwt, Claims};
use schoolops_api::config::AppConfig;
use schoolops_api::database::{MemoryStore, Store};
use schoolops_api::state::AppState;

/// One in-process server over a fresh in-memory store, on its own port
pub struct TestServer {
    pub base_url: String,
    pub config: AppConfig,
    client: reqwest::Client,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(AppConfig::development()).await
    }

    pub async fn start_with(config: AppConfig) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = AppState::from_config(config.clone(), store)?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, schoolops_api::app(state)).await;
        });

        Ok(Self {
            base_url,
            config,
            client: reqwest::Client::new(),
            handle,
        })
    }

    pub fn token(&self, user: &str, org: Option<&str>) -> String {
        self.sign(Claims::new(user, org.map(str::to_string), 1))
    }

    /// A token carrying the organization role that may register as coordinator
    pub fn admin_token(&self, user: &str, org: &str) -> String {
        let claims = Claims::new(user, Some(org.to_string()), 1)
            .with_org_name(Some(format!("{org} school")))
            .with_org_role(Some(self.config.security.coordinator_org_role.clone()));
        self.sign(claims)
    }

    pub fn sign(&self, claims: Claims) -> String {
        generate_jwt(&claims, &self.config.security.jwt_secret).expect("sign test token")
    }

    pub async fn send(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await?;
        let status = res.status();
        let body = res.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PATCH, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, path, Some(token), None).await
    }

    /// A school whose coordinator has registered; returns the coordinator's token
    pub async fn school(&self, org: &str, coordinator: &str) -> Result<String> {
        let token = self.admin_token(coordinator, org);
        let (status, body) = self
            .post("/api/members/sync", &token, json!({"role": "coordinator", "name": coordinator}))
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "coordinator sync failed: {status} {body}");
        Ok(token)
    }

    /// Registers `user` in `org` with the given role; returns their token and row id
    pub async fn member(&self, org: &str, user: &str, role: &str) -> Result<(String, String)> {
        let token = self.token(user, Some(org));
        let (status, body) = self
            .post("/api/members/sync", &token, json!({"role": role, "name": user}))
            .await?;
        anyhow::ensure!(status.is_success(), "{role} sync failed: {status} {body}");
        Ok((token, id_of(&body["data"]["record"])))
    }

    /// POST /api/data/:resource expecting 201; returns the new id
    pub async fn create(&self, token: &str, resource: &str, body: Value) -> Result<String> {
        let (status, res) = self.post(&format!("/api/data/{resource}"), token, body).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create {resource} failed: {status} {res}");
        Ok(id_of(&res["data"]))
    }

    /// Level, course and one section with a lesson and a quiz, created by a coordinator
    pub async fn course(&self, token: &str) -> Result<TestCourse> {
        let level = self
            .create(token, "levels", json!({"name": format!("Level {}", uuid::Uuid::new_v4()), "catalog_order": 1}))
            .await?;
        let course = self.create(token, "courses", json!({"level_id": level, "title": "Algebra"})).await?;
        let section = self
            .create(token, "sections", json!({"course_id": course, "title": "Basics", "position": 1}))
            .await?;
        let leaf = json!({"course_id": course, "section_id": section, "title": "Variables"});
        let lesson = self.create(token, "lessons", leaf.clone()).await?;
        let quiz = self.create(token, "quizzes", leaf).await?;
        Ok(TestCourse {
            level,
            course,
            section,
            lesson,
            quiz,
        })
    }
}

pub struct TestCourse {
    pub level: String,
    pub course: String,
    pub section: String,
    pub lesson: String,
    pub quiz: String,
}

pub fn id_of(record: &Value) -> String {
    record["id"].as_str().unwrap_or_default().to_string()
}
