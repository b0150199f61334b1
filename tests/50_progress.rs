mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::TestServer;

#[tokio::test]
async fn trainer_completions_upsert_and_list() -> Result<()> {
    let server = TestServer::start().await?;
    let coord = server.school("org_a", "coord_a").await?;
    let (trainer, _) = server.member("org_a", "trainer_1", "trainer").await?;
    let course = server.course(&coord).await?;
    let completed_path = format!("/api/progress/courses/{}/completed", course.course);

    let mark = json!({"content_kind": "lesson", "content_id": course.lesson});
    let (status, first) = server.post("/api/progress/completions", &trainer, mark.clone()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["completed"], json!(true));
    let (_, second) = server.post("/api/progress/completions", &trainer, mark).await?;
    assert_eq!(second["data"]["id"], first["data"]["id"]);

    let (status, body) = server.get(&completed_path, &trainer).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([course.lesson]));

    let (_, undone) = server
        .post(
            "/api/progress/completions",
            &trainer,
            json!({"content_kind": "lesson", "content_id": course.lesson, "completed": false}),
        )
        .await?;
    assert!(undone["data"]["completed_at"].is_null());
    let (_, body) = server.get(&completed_path, &trainer).await?;
    assert_eq!(body["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn students_record_progress_within_their_batch() -> Result<()> {
    let server = TestServer::start().await?;
    let coord = server.school("org_a", "coord_a").await?;
    let (student, student_id) = server.member("org_a", "student_1", "student").await?;
    let course = server.course(&coord).await?;
    let batch = server
        .create(&coord, "batches", json!({"name": "Cohort", "course_id": course.course, "student_ids": [student_id]}))
        .await?;
    let other = server.create(&coord, "batches", json!({"name": "Elsewhere"})).await?;

    let (status, _) = server
        .post(
            "/api/progress/completions",
            &student,
            json!({"content_kind": "lesson", "content_id": course.lesson, "batch_id": other}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Without a batch the caller acts as a trainer, which a student is not
    let (status, _) = server
        .post("/api/progress/completions", &student, json!({"content_kind": "lesson", "content_id": course.lesson}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .post(
            "/api/progress/completions",
            &student,
            json!({"content_kind": "lesson", "content_id": course.lesson, "batch_id": batch}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server
        .get(&format!("/api/progress/courses/{}/completed?batch_id={batch}", course.course), &student)
        .await?;
    assert_eq!(body["data"], json!([course.lesson]));
    Ok(())
}

#[tokio::test]
async fn quiz_attempts_append_and_latest_is_returned() -> Result<()> {
    let server = TestServer::start().await?;
    let coord = server.school("org_a", "coord_a").await?;
    let (trainer, _) = server.member("org_a", "trainer_1", "trainer").await?;
    let course = server.course(&coord).await?;
    let latest_path = format!("/api/progress/courses/{}/latest-attempt?quiz_id={}", course.course, course.quiz);

    let (_, body) = server.get(&latest_path, &trainer).await?;
    assert!(body["data"].is_null());

    let (status, body) = server
        .post("/api/progress/attempts", &trainer, json!({"quiz_id": course.quiz, "score": 12, "max_score": 10}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["score"].is_string());

    for score in [3, 8] {
        let (status, _) = server
            .post(
                "/api/progress/attempts",
                &trainer,
                json!({"quiz_id": course.quiz, "score": score, "max_score": 10, "answers": {"q1": score}}),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = server.get(&latest_path, &trainer).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["score"], json!(8));
    assert_eq!(body["data"]["answers"], json!({"q1": 8}));
    Ok(())
}

#[tokio::test]
async fn unknown_content_is_not_found() -> Result<()> {
    let server = TestServer::start().await?;
    server.school("org_a", "coord_a").await?;
    let (trainer, _) = server.member("org_a", "trainer_1", "trainer").await?;

    let (status, _) = server
        .post(
            "/api/progress/completions",
            &trainer,
            json!({"content_kind": "lesson", "content_id": uuid::Uuid::new_v4()}),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .post("/api/progress/completions", &trainer, json!({"content_kind": "video", "content_id": uuid::Uuid::new_v4()}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    Ok(())
}
