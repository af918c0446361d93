//! SQLite implementation of the audit trail storage port.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::ports::TaskHistoryRepository;

#[derive(Clone)]
pub struct SqliteTaskHistoryRepository {
    pool: SqlitePool,
}

impl SqliteTaskHistoryRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskHistoryRepository for SqliteTaskHistoryRepository {
    async fn record(
        &self,
        task_id: i64,
        from_status: Option<&str>,
        status_change: &str,
        worker_id: Option<&str>,
        message: Option<&str>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO task_history (task_id, from_status, status_change, worker_id, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(from_status)
        .bind(status_change)
        .bind(worker_id)
        .bind(message)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::create_migrated_test_pool;

    #[tokio::test]
    async fn record_then_read_back() {
        let pool = create_migrated_test_pool().await.unwrap();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO task_types (name, version, param_schema, is_active, created_at, updated_at) VALUES ('t', '1', '{}', 1, ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO tasks (type_id, status, params_json, dedupe_key, priority, progress, attempts, created_at, updated_at)
             VALUES (1, 'pending', '{}', 'k', 0, 0, 0, ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        let repo = SqliteTaskHistoryRepository::new(pool.clone());
        repo.record(1, None, "pending", None, None).await.unwrap();
        repo.record(1, Some("pending"), "claimed", Some("worker-a"), None).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_history WHERE task_id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 2);
    }
}
