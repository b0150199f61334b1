use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::resources::ResourceKind;

/// Who completed a piece of content: a student within a batch, or a trainer. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ActorKey {
    Student { student_id: Uuid, batch_id: Uuid },
    Trainer { trainer_id: Uuid },
}

impl ActorKey {
    pub fn student_id(&self) -> Option<Uuid> {
        match self {
            ActorKey::Student { student_id, .. } => Some(*student_id),
            ActorKey::Trainer { .. } => None,
        }
    }

    pub fn batch_id(&self) -> Option<Uuid> {
        match self {
            ActorKey::Student { batch_id, .. } => Some(*batch_id),
            ActorKey::Trainer { .. } => None,
        }
    }

    pub fn trainer_id(&self) -> Option<Uuid> {
        match self {
            ActorKey::Trainer { trainer_id } => Some(*trainer_id),
            ActorKey::Student { .. } => None,
        }
    }

    /// Whether a stored row's actor columns identify this actor
    pub fn matches(&self, student_id: Option<Uuid>, batch_id: Option<Uuid>, trainer_id: Option<Uuid>) -> bool {
        self.student_id() == student_id && self.batch_id() == batch_id && self.trainer_id() == trainer_id
    }
}

/// Content that can be marked complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Lesson,
    CourseAssignment,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Lesson => "lesson",
            ContentKind::CourseAssignment => "course_assignment",
        }
    }

    pub fn resource(self) -> ResourceKind {
        match self {
            ContentKind::Lesson => ResourceKind::Lessons,
            ContentKind::CourseAssignment => ResourceKind::CourseAssignments,
        }
    }

    pub fn for_resource(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::Lessons => Some(ContentKind::Lesson),
            ResourceKind::CourseAssignments => Some(ContentKind::CourseAssignment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: Uuid,
    pub course_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CompletionFact {
    pub id: Uuid,
    pub content_kind: String,
    pub content_id: Uuid,
    pub course_id: Uuid,
    pub student_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: Uuid,
    pub course_id: Uuid,
    pub actor: ActorKey,
    pub score: i32,
    pub max_score: i32,
    pub answers: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub course_id: Uuid,
    pub student_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub score: i32,
    pub max_score: i32,
    pub answers: Value,
    pub attempted_at: DateTime<Utc>,
}
