use std::collections::HashMap;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::database::store::{record_id, record_uuid};
use crate::database::{Filter, Record, Scope, ScopedQuery, SectionDeletion, Store};
use crate::resources::{ResourceKind, ResourceSpec, COURSES, COURSE_ASSIGNMENTS, LESSONS, QUIZZES, SECTIONS};

/// One section with its ordered leaves
#[derive(Debug, Clone, Serialize)]
pub struct SectionOutline {
    #[serde(flatten)]
    pub section: Record,
    pub lessons: Vec<Record>,
    pub quizzes: Vec<Record>,
    pub course_assignments: Vec<Record>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseOutline {
    pub course: Record,
    pub sections: Vec<SectionOutline>,
}

/// Removes a section and every lesson, quiz and course assignment under it, atomically
pub async fn delete_section(store: &dyn Store, section_id: Uuid) -> ServiceResult<SectionDeletion> {
    match store.delete_section_cascade(section_id).await {
        Ok(Some(removed)) => {
            info!(
                "Deleted section {} with {} lessons, {} quizzes, {} course assignments",
                section_id, removed.lessons, removed.quizzes, removed.course_assignments
            );
            Ok(removed)
        }
        Ok(None) => Err(ServiceError::not_found(ResourceKind::Sections)),
        Err(e) => {
            error!("Section {} cascade rolled back: {}", section_id, e);
            Err(e.into())
        }
    }
}

/// Sections in order, each with its leaves in order
pub async fn outline(store: &dyn Store, course_id: Uuid) -> ServiceResult<CourseOutline> {
    let course = store
        .select_record(&ScopedQuery::new(&COURSES, Scope::Shared), course_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Courses))?;

    let by_course = |spec: &'static ResourceSpec| {
        let mut query = ScopedQuery::new(spec, Scope::Shared);
        if let Some(column) = spec.column("course_id") {
            query.filters.push(Filter {
                column,
                value: course_id.to_string(),
            });
        }
        query
    };

    let queries = [&SECTIONS, &LESSONS, &QUIZZES, &COURSE_ASSIGNMENTS].map(by_course);
    let (sections, lessons, quizzes, course_assignments) = futures::try_join!(
        store.select_records(&queries[0]),
        store.select_records(&queries[1]),
        store.select_records(&queries[2]),
        store.select_records(&queries[3]),
    )?;

    let mut lessons = group_by_section(lessons);
    let mut quizzes = group_by_section(quizzes);
    let mut course_assignments = group_by_section(course_assignments);

    let sections = sections
        .into_iter()
        .map(|section| {
            let id = record_id(&section);
            SectionOutline {
                lessons: id.and_then(|id| lessons.remove(&id)).unwrap_or_default(),
                quizzes: id.and_then(|id| quizzes.remove(&id)).unwrap_or_default(),
                course_assignments: id.and_then(|id| course_assignments.remove(&id)).unwrap_or_default(),
                section,
            }
        })
        .collect();

    Ok(CourseOutline { course, sections })
}

/// Rows arrive already ordered; grouping keeps that order
fn group_by_section(rows: Vec<Record>) -> HashMap<Uuid, Vec<Record>> {
    let mut grouped: HashMap<Uuid, Vec<Record>> = HashMap::new();
    for row in rows {
        if let Some(section) = record_uuid(&row, "section_id") {
            grouped.entry(section).or_default().push(row);
        }
    }
    grouped
}
