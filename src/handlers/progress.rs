// handlers/progress.rs - completion facts and quiz attempts under /api/progress

use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{CompletionFact, ContentKind, QuizAttempt};
use crate::middleware::{parse_id, ApiResponse, ApiResult, JsonBody, QueryParams};
use crate::services::{ProgressLedger, RequestContext};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CompletionBody {
    content_kind: ContentKind,
    content_id: Uuid,
    batch_id: Option<Uuid>,
    #[serde(default = "default_completed")]
    completed: bool,
}

fn default_completed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AttemptBody {
    quiz_id: Uuid,
    batch_id: Option<Uuid>,
    score: i32,
    max_score: i32,
    #[serde(default)]
    answers: Value,
}

/// POST /api/progress/completions - upsert the caller's state for one lesson or course assignment
pub async fn record_completion(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: JsonBody,
) -> ApiResult<CompletionFact> {
    let body: CompletionBody = body.parse()?;

    let accessor = state.accessor();
    let fact = ProgressLedger::new(state.store.as_ref(), &accessor)
        .record_completion(&ctx, body.content_kind, body.content_id, body.batch_id, body.completed)
        .await?;
    Ok(ApiResponse::success(fact))
}

/// POST /api/progress/attempts
pub async fn record_attempt(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: JsonBody,
) -> ApiResult<QuizAttempt> {
    let body: AttemptBody = body.parse()?;

    let accessor = state.accessor();
    let attempt = ProgressLedger::new(state.store.as_ref(), &accessor)
        .record_attempt(&ctx, body.quiz_id, body.batch_id, body.score, body.max_score, body.answers)
        .await?;
    Ok(ApiResponse::created(attempt))
}

/// GET /api/progress/courses/:id/completed[?batch_id=]
pub async fn completed(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(course_id): Path<String>,
    params: QueryParams,
) -> ApiResult<Vec<Uuid>> {
    let course_id = parse_id("id", &course_id)?;
    let batch_id = params.optional_uuid("batch_id")?;

    let accessor = state.accessor();
    let ids = ProgressLedger::new(state.store.as_ref(), &accessor)
        .completed_content_ids(&ctx, course_id, batch_id)
        .await?;
    Ok(ApiResponse::success(ids))
}

/// GET /api/progress/courses/:id/latest-attempt[?quiz_id=&batch_id=]
pub async fn latest_attempt(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(course_id): Path<String>,
    params: QueryParams,
) -> ApiResult<Option<QuizAttempt>> {
    let course_id = parse_id("id", &course_id)?;
    let batch_id = params.optional_uuid("batch_id")?;
    let quiz_id = params.optional_uuid("quiz_id")?;

    let accessor = state.accessor();
    let attempt = ProgressLedger::new(state.store.as_ref(), &accessor)
        .latest_attempt(&ctx, course_id, batch_id, quiz_id)
        .await?;
    Ok(ApiResponse::success(attempt))
}
