use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::memory::MemoryStore;
use super::postgres::PgStore;
use super::store::Store;
use crate::config::{DatabaseConfig, StoreBackend};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const UNDEFINED_TABLE: &str = "42P01";

/// Errors from the datastore layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    #[error("Table not initialized: {0}")]
    UndefinedTable(String),

    #[error("Tenant scope required for {0}")]
    ScopeRequired(&'static str),

    #[error("Transactions unavailable: {0}")]
    TransactionsUnavailable(String),

    #[error("Unexpected row shape: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let detail = db
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db.message().to_string());
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return DatabaseError::UniqueViolation(detail),
                Some(FOREIGN_KEY_VIOLATION) => return DatabaseError::ForeignKeyViolation(detail),
                Some(CHECK_VIOLATION) => return DatabaseError::CheckViolation(detail),
                Some(UNDEFINED_TABLE) => return DatabaseError::UndefinedTable(db.message().to_string()),
                _ => {}
            }
        }
        DatabaseError::Sqlx(err)
    }
}

impl DatabaseError {
    /// Connectivity failures, as opposed to query failures
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut)
                | DatabaseError::Sqlx(sqlx::Error::PoolClosed)
                | DatabaseError::Sqlx(sqlx::Error::Io(_))
        )
    }
}

/// Builds the shared Postgres pool from configuration
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected database pool: {}", Self::redacted_url(url)?);
        Ok(pool)
    }

    /// Opens the configured backend, verifies it can run transactions, and
    /// applies the schema when `run_migrations` is set
    pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, DatabaseError> {
        let store: Arc<dyn Store> = match config.backend {
            StoreBackend::Memory => {
                warn!("Using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Postgres => Arc::new(PgStore::new(Self::connect(config).await?)),
        };

        store.verify_transactions().await?;
        if config.run_migrations {
            store.apply_schema().await?;
        }
        Ok(store)
    }

    /// Connection target with credentials removed, for logging
    pub fn redacted_url(url: &str) -> Result<String, DatabaseError> {
        let mut parsed = url::Url::parse(url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if parsed.password().is_some() {
            parsed
                .set_password(Some("***"))
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(parsed.into())
    }
}
