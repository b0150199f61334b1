use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::resources::ResourceKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Level {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub catalog_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of an activatable subject/level relation. Rows are never removed by unassignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LevelAssignment {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub level_id: Uuid,
    pub active: bool,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: String,
    pub unassigned_at: Option<DateTime<Utc>>,
}

/// The two subject kinds that carry level assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    TrainerLevel,
    BatchLevel,
}

impl Relation {
    pub fn table(self) -> &'static str {
        match self {
            Relation::TrainerLevel => "trainer_levels",
            Relation::BatchLevel => "batch_levels",
        }
    }

    pub fn subject_column(self) -> &'static str {
        match self {
            Relation::TrainerLevel => "trainer_id",
            Relation::BatchLevel => "batch_id",
        }
    }

    pub fn subject_kind(self) -> ResourceKind {
        match self {
            Relation::TrainerLevel => ResourceKind::Trainers,
            Relation::BatchLevel => ResourceKind::Batches,
        }
    }

    pub fn for_subject(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::Trainers => Some(Relation::TrainerLevel),
            ResourceKind::Batches => Some(Relation::BatchLevel),
            _ => None,
        }
    }
}
