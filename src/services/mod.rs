pub mod accessor;
pub mod context;
pub mod course_tree;
pub mod error;
pub mod level_assignment;
pub mod membership;
pub mod progress;
pub mod role_gate;
pub mod tenant_directory;

pub use accessor::{Deleted, ResourceAccessor};
pub use context::RequestContext;
pub use error::{ServiceError, ServiceResult};
pub use level_assignment::{LevelAssignments, SubjectLevels};
pub use membership::{MemberRole, Membership, SyncOutcome, Whoami};
pub use progress::ProgressLedger;
pub use role_gate::{Gate, GatePolicy, Mutation, PolicyError};
pub use tenant_directory::TenantDirectory;
