//! SQLite storage adapter (C1): connection pooling, schema migrations, and
//! the per-port repository implementations.

pub mod connection;
pub mod endpoint_repository;
pub mod migrations;
pub mod task_history_repository;
pub mod task_repository;
pub mod task_type_repository;

pub use endpoint_repository::SqliteEndpointRepository;
pub use task_history_repository::SqliteTaskHistoryRepository;
pub use task_repository::SqliteTaskRepository;
pub use task_type_repository::SqliteTaskTypeRepository;

use sqlx::SqlitePool;

use self::connection::{create_pool, ConnectionError, PoolConfig};
use self::migrations::{all_embedded_migrations, MigrationError, Migrator};

/// Owns the pool and brings it to the current schema version.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl DatabaseConnection {
    /// Open `database_url`, applying any pending embedded migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let pool = create_pool(database_url, Some(PoolConfig { max_connections, ..PoolConfig::default() })).await?;
        Migrator::new(pool.clone()).run_embedded_migrations(all_embedded_migrations()).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// An in-memory pool already migrated to the current schema, for tests.
#[cfg(test)]
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = self::connection::create_test_pool().await?;
    Migrator::new(pool.clone()).run_embedded_migrations(all_embedded_migrations()).await?;
    Ok(pool)
}
