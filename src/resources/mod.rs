//! Static descriptors for every resource family served by the generic accessor.
//!
//! A descriptor names the table, how a row's tenant is resolved (its ownership
//! chain), which columns a client may write, and how the row relates to other
//! resources. Handlers never hand-roll tenant predicates; they look up a
//! descriptor and go through [`crate::services::accessor::ResourceAccessor`].

use serde::{Deserialize, Serialize};

mod catalog;
mod tenant_owned;

pub use catalog::{COURSES, COURSE_ASSIGNMENTS, LESSONS, LEVELS, QUIZZES, SECTIONS};
pub use tenant_owned::{
    ANNOUNCEMENTS, ASSIGNMENTS, BATCHES, COORDINATORS, SESSIONS, STUDENTS, SUBMISSIONS, TRAINERS,
};

/// Columns maintained by the system; clients may never write them
pub const SYSTEM_COLUMNS: [&str; 4] = ["id", "tenant_id", "created_at", "updated_at"];

/// Column holding a membership row's external user id
pub const IDENTITY_COLUMN: &str = "external_user_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Coordinators,
    Trainers,
    Students,
    Batches,
    Sessions,
    Assignments,
    Submissions,
    Announcements,
    Levels,
    Courses,
    Sections,
    Lessons,
    Quizzes,
    CourseAssignments,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 14] = [
        ResourceKind::Coordinators,
        ResourceKind::Trainers,
        ResourceKind::Students,
        ResourceKind::Batches,
        ResourceKind::Sessions,
        ResourceKind::Assignments,
        ResourceKind::Submissions,
        ResourceKind::Announcements,
        ResourceKind::Levels,
        ResourceKind::Courses,
        ResourceKind::Sections,
        ResourceKind::Lessons,
        ResourceKind::Quizzes,
        ResourceKind::CourseAssignments,
    ];

    pub fn as_str(self) -> &'static str {
        self.spec().table
    }

    /// Parse the resource segment of a route (`/api/data/:resource`)
    pub fn from_path(segment: &str) -> Option<Self> {
        let normalized = segment.replace('-', "_");
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }

    pub fn spec(self) -> &'static ResourceSpec {
        match self {
            ResourceKind::Coordinators => &COORDINATORS,
            ResourceKind::Trainers => &TRAINERS,
            ResourceKind::Students => &STUDENTS,
            ResourceKind::Batches => &BATCHES,
            ResourceKind::Sessions => &SESSIONS,
            ResourceKind::Assignments => &ASSIGNMENTS,
            ResourceKind::Submissions => &SUBMISSIONS,
            ResourceKind::Announcements => &ANNOUNCEMENTS,
            ResourceKind::Levels => &LEVELS,
            ResourceKind::Courses => &COURSES,
            ResourceKind::Sections => &SECTIONS,
            ResourceKind::Lessons => &LESSONS,
            ResourceKind::Quizzes => &QUIZZES,
            ResourceKind::CourseAssignments => &COURSE_ASSIGNMENTS,
        }
    }

    /// Singular noun for error messages
    pub fn noun(self) -> &'static str {
        match self {
            ResourceKind::Coordinators => "coordinator",
            ResourceKind::Trainers => "trainer",
            ResourceKind::Students => "student",
            ResourceKind::Batches => "batch",
            ResourceKind::Sessions => "session",
            ResourceKind::Assignments => "assignment",
            ResourceKind::Submissions => "submission",
            ResourceKind::Announcements => "announcement",
            ResourceKind::Levels => "level",
            ResourceKind::Courses => "course",
            ResourceKind::Sections => "section",
            ResourceKind::Lessons => "lesson",
            ResourceKind::Quizzes => "quiz",
            ResourceKind::CourseAssignments => "course assignment",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a row's owning tenant is determined
#[derive(Debug, Clone, Copy)]
pub enum Ownership {
    /// The row carries a `tenant_id` column
    Direct,
    /// The row reaches a directly owned row through foreign keys, nearest parent first
    Through(&'static [Hop]),
    /// Shared catalog content, not owned by any tenant
    Shared,
}

/// One step of an ownership chain: `column` on the child references `parent.id`
#[derive(Debug, Clone, Copy)]
pub struct Hop {
    pub column: &'static str,
    pub parent: ResourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    UuidList,
    Text,
    Integer,
    Number,
    Boolean,
    Timestamp,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub required: bool,
    pub patchable: bool,
    pub filterable: bool,
    /// Allowed values for enumerated text columns
    pub one_of: Option<&'static [&'static str]>,
    /// Value written on create when the client omits the column
    pub default: Option<DefaultValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Text(&'static str),
    Integer(i64),
    EmptyList,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            required: false,
            patchable: true,
            filterable: false,
            one_of: None,
            default: None,
        }
    }

    pub const fn required(self) -> Self {
        Self { required: true, ..self }
    }

    pub const fn fixed(self) -> Self {
        Self { patchable: false, ..self }
    }

    pub const fn filterable(self) -> Self {
        Self { filterable: true, ..self }
    }

    pub const fn one_of(self, values: &'static [&'static str]) -> Self {
        Self { one_of: Some(values), ..self }
    }

    pub const fn defaults_to(self, value: DefaultValue) -> Self {
        Self { default: Some(value), ..self }
    }
}

/// What happens to a referencing row when its target is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    Restrict,
    /// Only valid for uuid-list columns: the id is removed from the list
    Prune,
}

#[derive(Debug, Clone, Copy)]
pub struct Reference {
    pub column: &'static str,
    pub target: ResourceKind,
    pub on_delete: OnDelete,
}

/// Requires `column`'s target row to agree with this row on a second column,
/// e.g. a lesson's section must belong to the lesson's course.
#[derive(Debug, Clone, Copy)]
pub struct ParentMatch {
    pub column: &'static str,
    pub parent: ResourceKind,
    pub parent_column: &'static str,
    pub local_column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStrategy {
    Row,
    SectionCascade,
}

#[derive(Debug)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub table: &'static str,
    pub ownership: Ownership,
    pub columns: &'static [Column],
    pub references: &'static [Reference],
    pub unique: &'static [&'static [&'static str]],
    pub parent_match: Option<ParentMatch>,
    pub order_by: &'static [&'static str],
    pub delete: DeleteStrategy,
    /// Message for unique-constraint conflicts, when more specific than the default
    pub conflict_message: Option<&'static str>,
}

impl ResourceSpec {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_tenant_owned(&self) -> bool {
        !matches!(self.ownership, Ownership::Shared)
    }

    pub fn has_identity_column(&self) -> bool {
        self.column(IDENTITY_COLUMN).is_some()
    }

    pub fn reference(&self, column: &str) -> Option<&'static Reference> {
        self.references.iter().find(|r| r.column == column)
    }

    /// Every persisted column name, system columns included
    pub fn all_columns(&self) -> Vec<&'static str> {
        let mut names = vec!["id"];
        if matches!(self.ownership, Ownership::Direct) {
            names.push("tenant_id");
        }
        names.extend(self.columns.iter().map(|c| c.name));
        names.extend(["created_at", "updated_at"]);
        names
    }
}

/// References from any resource that point at `target`
pub fn referrers(target: ResourceKind) -> Vec<(&'static ResourceSpec, &'static Reference)> {
    ResourceKind::ALL
        .iter()
        .map(|kind| kind.spec())
        .flat_map(|spec| spec.references.iter().map(move |r| (spec, r)))
        .filter(|(_, r)| r.target == target)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_path() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.spec().kind, kind);
            assert_eq!(ResourceKind::from_path(kind.as_str()), Some(kind));
        }
        assert_eq!(
            ResourceKind::from_path("course-assignments"),
            Some(ResourceKind::CourseAssignments)
        );
        assert_eq!(ResourceKind::from_path("tenants"), None);
    }

    #[test]
    fn ownership_chains_terminate_at_directly_owned_tables() {
        for kind in ResourceKind::ALL {
            let spec = kind.spec();
            if let Ownership::Through(hops) = spec.ownership {
                assert!(!hops.is_empty(), "{kind} has an empty chain");
                let last = hops[hops.len() - 1].parent.spec();
                assert!(matches!(last.ownership, Ownership::Direct), "{kind} chain ends at {}", last.kind);

                // The first hop column must be a required, declared reference
                let first = hops[0];
                let column = spec.column(first.column).expect("hop column declared");
                assert!(column.required, "{kind}.{} must be required", first.column);
                assert!(spec.reference(first.column).is_some());
            }
        }
    }

    #[test]
    fn prune_is_only_used_on_uuid_lists() {
        for kind in ResourceKind::ALL {
            let spec = kind.spec();
            for reference in spec.references {
                let column = spec.column(reference.column).expect("reference column declared");
                let is_list = column.ty == ColumnType::UuidList;
                assert_eq!(is_list, reference.on_delete == OnDelete::Prune, "{kind}.{}", reference.column);
            }
        }
    }

    #[test]
    fn declared_columns_never_shadow_system_columns() {
        for kind in ResourceKind::ALL {
            for column in kind.spec().columns {
                assert!(!SYSTEM_COLUMNS.contains(&column.name), "{kind}.{}", column.name);
            }
        }
    }

    #[test]
    fn referrers_finds_batch_membership_lists() {
        let refs = referrers(ResourceKind::Trainers);
        assert!(refs
            .iter()
            .any(|(spec, r)| spec.kind == ResourceKind::Batches && r.column == "trainer_ids"));
    }
}
