use super::ColumnType::*;
use super::{
    Column, DefaultValue, DeleteStrategy, OnDelete, Ownership, ParentMatch, Reference, ResourceKind,
    ResourceSpec,
};

pub static LEVELS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Levels,
    table: "levels",
    ownership: Ownership::Shared,
    columns: &[
        Column::new("name", Text).required(),
        Column::new("description", Text),
        Column::new("catalog_order", Integer).required(),
    ],
    references: &[],
    unique: &[&["name"]],
    parent_match: None,
    order_by: &["catalog_order", "name"],
    delete: DeleteStrategy::Row,
    conflict_message: Some("a level with this name already exists"),
};

pub static COURSES: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Courses,
    table: "courses",
    ownership: Ownership::Shared,
    columns: &[
        Column::new("level_id", Uuid).required().filterable(),
        Column::new("title", Text).required(),
        Column::new("description", Text),
        Column::new("position", Integer).defaults_to(DefaultValue::Integer(0)),
    ],
    references: &[Reference { column: "level_id", target: ResourceKind::Levels, on_delete: OnDelete::Restrict }],
    unique: &[],
    parent_match: None,
    order_by: &["position"],
    delete: DeleteStrategy::Row,
    conflict_message: None,
};

pub static SECTIONS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Sections,
    table: "sections",
    ownership: Ownership::Shared,
    columns: &[
        Column::new("course_id", Uuid).required().fixed().filterable(),
        Column::new("title", Text).required(),
        Column::new("position", Integer).defaults_to(DefaultValue::Integer(0)),
    ],
    references: &[Reference { column: "course_id", target: ResourceKind::Courses, on_delete: OnDelete::Restrict }],
    unique: &[],
    parent_match: None,
    order_by: &["position"],
    delete: DeleteStrategy::SectionCascade,
    conflict_message: None,
};

const SECTION_IN_COURSE: ParentMatch = ParentMatch {
    column: "section_id",
    parent: ResourceKind::Sections,
    parent_column: "course_id",
    local_column: "course_id",
};

// Leaves are removed by the section cascade; a plain section delete is refused while they exist.
const LEAF_REFERENCES: &[Reference] = &[
    Reference { column: "course_id", target: ResourceKind::Courses, on_delete: OnDelete::Restrict },
    Reference { column: "section_id", target: ResourceKind::Sections, on_delete: OnDelete::Restrict },
];

pub static LESSONS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Lessons,
    table: "lessons",
    ownership: Ownership::Shared,
    columns: &[
        Column::new("course_id", Uuid).required().filterable(),
        Column::new("section_id", Uuid).required().filterable(),
        Column::new("title", Text).required(),
        Column::new("body", Text),
        Column::new("content_url", Text),
        Column::new("duration_minutes", Integer),
        Column::new("position", Integer).defaults_to(DefaultValue::Integer(0)),
    ],
    references: LEAF_REFERENCES,
    unique: &[],
    parent_match: Some(SECTION_IN_COURSE),
    order_by: &["position"],
    delete: DeleteStrategy::Row,
    conflict_message: None,
};

pub static QUIZZES: ResourceSpec = ResourceSpec {
    kind: ResourceKind::Quizzes,
    table: "quizzes",
    ownership: Ownership::Shared,
    columns: &[
        Column::new("course_id", Uuid).required().filterable(),
        Column::new("section_id", Uuid).required().filterable(),
        Column::new("title", Text).required(),
        Column::new("questions", Json),
        Column::new("pass_score", Integer),
        Column::new("position", Integer).defaults_to(DefaultValue::Integer(0)),
    ],
    references: LEAF_REFERENCES,
    unique: &[],
    parent_match: Some(SECTION_IN_COURSE),
    order_by: &["position"],
    delete: DeleteStrategy::Row,
    conflict_message: None,
};

pub static COURSE_ASSIGNMENTS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::CourseAssignments,
    table: "course_assignments",
    ownership: Ownership::Shared,
    columns: &[
        Column::new("course_id", Uuid).required().filterable(),
        Column::new("section_id", Uuid).required().filterable(),
        Column::new("title", Text).required(),
        Column::new("instructions", Text),
        Column::new("attachment_url", Text),
        Column::new("max_score", Integer),
        Column::new("position", Integer).defaults_to(DefaultValue::Integer(0)),
    ],
    references: LEAF_REFERENCES,
    unique: &[],
    parent_match: Some(SECTION_IN_COURSE),
    order_by: &["position"],
    delete: DeleteStrategy::Row,
    conflict_message: None,
};
