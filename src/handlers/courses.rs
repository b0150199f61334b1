// handlers/courses.rs - GET /api/courses/:id/outline

use axum::{
    extract::{Path, State},
    Extension,
};

use crate::middleware::{parse_id, ApiResponse, ApiResult};
use crate::resources::ResourceKind;
use crate::services::course_tree::{self, CourseOutline};
use crate::services::RequestContext;
use crate::state::AppState;

/// The course with its sections in position order, each carrying its leaves
pub async fn outline(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<CourseOutline> {
    let id = parse_id("id", &id)?;
    state.accessor().get_if_owned(&ctx, ResourceKind::Courses, id).await?;
    let outline = course_tree::outline(state.store.as_ref(), id).await?;
    Ok(ApiResponse::success(outline))
}
