use std::collections::BTreeMap;

use crate::database::DatabaseError;
use crate::resources::ResourceKind;

/// Failures of the tenant-scoped core, independent of transport
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("No organization selected")]
    NoTenantSelected,

    #[error("{0}")]
    Forbidden(String),

    /// Absent, or owned by another tenant. The two are never distinguished.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Invalid {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn not_found(kind: ResourceKind) -> Self {
        ServiceError::NotFound(format!("{} not found", kind.noun()))
    }

    pub fn coordinator_required() -> Self {
        ServiceError::Forbidden("Coordinator role required".into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::Invalid {
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, problem: impl Into<String>) -> Self {
        let mut field_errors = BTreeMap::new();
        field_errors.insert(field.into(), problem.into());
        ServiceError::Invalid {
            message: "Invalid request body".into(),
            field_errors,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
