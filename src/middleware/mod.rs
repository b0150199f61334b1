pub mod auth;
pub mod extract;
pub mod response;
pub mod tenant;

pub use auth::require_principal;
pub use extract::{parse_id, JsonBody, QueryParams};
pub use response::{ApiResponse, ApiResult};
pub use tenant::resolve_tenant;
