use super::ColumnType::*;
use super::{
    Column, DefaultValue, DeleteStrategy, Hop, OnDelete, Ownership, Reference, ResourceKind,
    ResourceSpec,
};

pub static COORDINATORS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Coordinators,
    table: "coordinators",
    ownership: Ownership::Direct,
    columns: &[
        Column::new("external_user_id", Text).fixed().filterable(),
        Column::new("name", Text).required(),
        Column::new("email", Text),
        Column::new("phone", Text),
    ],
    references: &[],
    unique: &[&["tenant_id"]],
    parent_match: None,
    order_by: &["created_at"],
    delete: DeleteStrategy::Row,
    conflict_message: Some("this school already has a coordinator"),
};

pub static TRAINERS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Trainers,
    table: "trainers",
    ownership: Ownership::Direct,
    columns: &[
        Column::new("external_user_id", Text).fixed().filterable(),
        Column::new("name", Text).required(),
        Column::new("email", Text).filterable(),
        Column::new("phone", Text),
        Column::new("specialization", Text),
    ],
    references: &[],
    unique: &[&["tenant_id", "external_user_id"]],
    parent_match: None,
    order_by: &["name"],
    delete: DeleteStrategy::Row,
    conflict_message: Some("a trainer is already registered for this user"),
};

pub static STUDENTS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Students,
    table: "students",
    ownership: Ownership::Direct,
    columns: &[
        Column::new("external_user_id", Text).fixed().filterable(),
        Column::new("name", Text).required(),
        Column::new("email", Text).filterable(),
        Column::new("phone", Text),
        Column::new("guardian_name", Text),
        Column::new("guardian_phone", Text),
    ],
    references: &[],
    unique: &[&["tenant_id", "external_user_id"]],
    parent_match: None,
    order_by: &["name"],
    delete: DeleteStrategy::Row,
    conflict_message: Some("a student is already registered for this user"),
};

pub static BATCHES: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Batches,
    table: "batches",
    ownership: Ownership::Direct,
    columns: &[
        Column::new("name", Text).required(),
        Column::new("status", Text)
            .filterable()
            .one_of(&["pending", "active", "completed", "archived"])
            .defaults_to(DefaultValue::Text("pending")),
        Column::new("course_id", Uuid).filterable(),
        Column::new("trainer_ids", UuidList).filterable().defaults_to(DefaultValue::EmptyList),
        Column::new("student_ids", UuidList).filterable().defaults_to(DefaultValue::EmptyList),
        Column::new("starts_at", Timestamp),
        Column::new("ends_at", Timestamp),
    ],
    references: &[
        Reference { column: "course_id", target: ResourceKind::Courses, on_delete: OnDelete::Restrict },
        Reference { column: "trainer_ids", target: ResourceKind::Trainers, on_delete: OnDelete::Prune },
        Reference { column: "student_ids", target: ResourceKind::Students, on_delete: OnDelete::Prune },
    ],
    unique: &[],
    parent_match: None,
    order_by: &["name"],
    delete: DeleteStrategy::Row,
    conflict_message: None,
};

const THROUGH_BATCH: &[Hop] = &[Hop { column: "batch_id", parent: ResourceKind::Batches }];

pub static SESSIONS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Sessions,
    table: "sessions",
    ownership: Ownership::Through(THROUGH_BATCH),
    columns: &[
        Column::new("batch_id", Uuid).required().filterable(),
        Column::new("title", Text).required(),
        Column::new("scheduled_at", Timestamp).required(),
        Column::new("duration_minutes", Integer),
        Column::new("meeting_url", Text),
        Column::new("status", Text)
            .filterable()
            .one_of(&["scheduled", "completed", "cancelled"])
            .defaults_to(DefaultValue::Text("scheduled")),
        Column::new("notes", Text),
    ],
    references: &[Reference { column: "batch_id", target: ResourceKind::Batches, on_delete: OnDelete::Cascade }],
    unique: &[],
    parent_match: None,
    order_by: &["scheduled_at"],
    delete: DeleteStrategy::Row,
    conflict_message: None,
};

pub static ASSIGNMENTS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Assignments,
    table: "assignments",
    ownership: Ownership::Through(THROUGH_BATCH),
    columns: &[
        Column::new("batch_id", Uuid).required().filterable(),
        Column::new("title", Text).required(),
        Column::new("description", Text),
        Column::new("due_at", Timestamp),
        Column::new("attachment_url", Text),
        Column::new("max_score", Integer),
    ],
    references: &[Reference { column: "batch_id", target: ResourceKind::Batches, on_delete: OnDelete::Cascade }],
    unique: &[],
    parent_match: None,
    order_by: &["created_at"],
    delete: DeleteStrategy::Row,
    conflict_message: None,
};

pub static SUBMISSIONS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Submissions,
    table: "submissions",
    ownership: Ownership::Through(&[
        Hop { column: "assignment_id", parent: ResourceKind::Assignments },
        Hop { column: "batch_id", parent: ResourceKind::Batches },
    ]),
    columns: &[
        Column::new("assignment_id", Uuid).required().fixed().filterable(),
        Column::new("student_id", Uuid).required().fixed().filterable(),
        Column::new("content", Text),
        Column::new("attachment_url", Text),
        Column::new("status", Text)
            .filterable()
            .one_of(&["submitted", "graded", "returned"])
            .defaults_to(DefaultValue::Text("submitted")),
        Column::new("score", Number),
        Column::new("feedback", Text),
    ],
    references: &[
        Reference { column: "assignment_id", target: ResourceKind::Assignments, on_delete: OnDelete::Cascade },
        Reference { column: "student_id", target: ResourceKind::Students, on_delete: OnDelete::Cascade },
    ],
    unique: &[&["assignment_id", "student_id"]],
    parent_match: None,
    order_by: &["created_at"],
    delete: DeleteStrategy::Row,
    conflict_message: Some("this student has already submitted this assignment"),
};

pub static ANNOUNCEMENTS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Announcements,
    table: "announcements",
    ownership: Ownership::Direct,
    columns: &[
        Column::new("title", Text).required(),
        Column::new("body", Text).required(),
        Column::new("audience", Text)
            .filterable()
            .one_of(&["all", "trainers", "students"])
            .defaults_to(DefaultValue::Text("all")),
        Column::new("batch_id", Uuid).filterable(),
    ],
    references: &[Reference { column: "batch_id", target: ResourceKind::Batches, on_delete: OnDelete::Cascade }],
    unique: &[],
    parent_match: None,
    order_by: &["created_at"],
    delete: DeleteStrategy::Row,
    conflict_message: None,
};
