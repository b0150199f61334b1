pub mod level;
pub mod progress;
pub mod tenant;

pub use level::{Level, LevelAssignment, Relation};
pub use progress::{ActorKey, CompletionFact, ContentKind, ContentRef, NewAttempt, QuizAttempt};
pub use tenant::Tenant;
