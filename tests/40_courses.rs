mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::TestServer;

#[tokio::test]
async fn outline_nests_leaves_under_sections() -> Result<()> {
    let server = TestServer::start().await?;
    let coord = server.school("org_a", "coord_a").await?;
    let course = server.course(&coord).await?;
    let later = server
        .create(&coord, "sections", json!({"course_id": course.course, "title": "Later", "position": 2}))
        .await?;

    let (status, body) = server.get(&format!("/api/courses/{}/outline", course.course), &coord).await?;
    assert_eq!(status, StatusCode::OK);
    let outline = &body["data"];
    assert_eq!(outline["course"]["title"], json!("Algebra"));
    assert_eq!(outline["sections"][0]["id"], json!(course.section));
    assert_eq!(outline["sections"][0]["lessons"][0]["id"], json!(course.lesson));
    assert_eq!(outline["sections"][0]["quizzes"][0]["id"], json!(course.quiz));
    assert_eq!(outline["sections"][1]["id"], json!(later));
    assert_eq!(outline["sections"][1]["lessons"], json!([]));
    Ok(())
}

#[tokio::test]
async fn leaves_must_sit_in_their_course() -> Result<()> {
    let server = TestServer::start().await?;
    let coord = server.school("org_a", "coord_a").await?;
    let first = server.course(&coord).await?;
    let second = server.course(&coord).await?;

    let (status, body) = server
        .post(
            "/api/data/lessons",
            &coord,
            json!({"course_id": first.course, "section_id": second.section, "title": "Misplaced"}),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["section_id"].is_string());

    // Moving an existing leaf is checked the same way
    let (status, _) = server
        .patch(&format!("/api/data/lessons/{}", first.lesson), &coord, json!({"section_id": second.section}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn deleting_a_section_removes_its_leaves() -> Result<()> {
    let server = TestServer::start().await?;
    let coord = server.school("org_a", "coord_a").await?;
    let course = server.course(&coord).await?;
    server
        .create(
            &coord,
            "course_assignments",
            json!({"course_id": course.course, "section_id": course.section, "title": "Homework"}),
        )
        .await?;

    let (status, body) = server.delete(&format!("/api/data/sections/{}", course.section), &coord).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], json!({"lessons": 1, "quizzes": 1, "course_assignments": 1}));

    let (status, _) = server.get(&format!("/api/data/lessons/{}", course.lesson), &coord).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.delete(&format!("/api/data/sections/{}", course.section), &coord).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn catalog_writes_need_a_coordinator() -> Result<()> {
    let server = TestServer::start().await?;
    let coord = server.school("org_a", "coord_a").await?;
    let (trainer, _) = server.member("org_a", "trainer_1", "trainer").await?;
    let course = server.course(&coord).await?;

    let (status, _) = server
        .post("/api/data/levels", &trainer, json!({"name": "Sneaky", "catalog_order": 7}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .patch(&format!("/api/data/courses/{}", course.course), &trainer, json!({"title": "Renamed"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reading the catalog is open to every member
    let (status, body) = server.get(&format!("/api/data/courses/{}", course.course), &trainer).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], json!("Algebra"));

    // A course still used by a batch cannot be deleted
    server
        .create(&coord, "batches", json!({"name": "Cohort", "course_id": course.course}))
        .await?;
    let (status, _) = server.delete(&format!("/api/data/courses/{}", course.course), &coord).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}
