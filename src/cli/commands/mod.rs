pub mod migrate;
pub mod tenant;
pub mod token;

use std::sync::Arc;

use anyhow::Context;

use crate::config::{config, DatabaseConfig, StoreBackend};
use crate::database::{DatabaseManager, Store};

/// Opens the configured postgres store. The in-memory backend holds nothing
/// between processes, so operator commands refuse it.
pub(crate) async fn open_store(run_migrations: bool) -> anyhow::Result<Arc<dyn Store>> {
    let database = DatabaseConfig {
        run_migrations,
        ..config().database.clone()
    };
    if database.backend == StoreBackend::Memory {
        anyhow::bail!("operator commands need DATABASE_BACKEND=postgres");
    }
    DatabaseManager::open_store(&database)
        .await
        .context("failed to open the datastore")
}
