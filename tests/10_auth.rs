mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use schoolops_api::auth::Claims;
use serde_json::json;

use common::TestServer;

#[tokio::test]
async fn health_and_root_are_public() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server.send(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("ok"));

    let (status, body) = server.send(Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    Ok(())
}

#[tokio::test]
async fn missing_or_bad_tokens_are_unauthenticated() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server.send(Method::GET, "/api/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("UNAUTHENTICATED"));

    let (status, _) = server.get("/api/data/batches", "not-a-jwt").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Expired beyond the leeway
    let mut claims = Claims::new("user_1", Some("org_a".into()), 1);
    claims.exp = claims.iat - 3600;
    let expired = server.sign(claims);
    let (status, _) = server.get("/api/principal", &expired).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn tokens_without_an_organization_get_no_tenant_selected() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.token("user_1", None);

    // Identity alone is enough for the principal view
    let (status, body) = server.get("/api/principal", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["external_user_id"], json!("user_1"));

    let (status, body) = server.get("/api/me", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!("NO_TENANT_SELECTED"));
    Ok(())
}

#[tokio::test]
async fn first_request_creates_the_tenant_from_org_claims() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token("coord_a", "org_a");

    let (status, body) = server.get("/api/tenant", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["external_org_id"], json!("org_a"));
    assert_eq!(body["data"]["name"], json!("org_a school"));

    // Same org, same tenant
    let (_, again) = server.get("/api/tenant", &server.token("someone", Some("org_a"))).await?;
    assert_eq!(again["data"]["id"], body["data"]["id"]);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_and_resources_are_not_found() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.token("user_1", Some("org_a"));

    let (status, body) = server.get("/api/data/widgets", &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    let (status, _) = server.send(Method::GET, "/nowhere", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
