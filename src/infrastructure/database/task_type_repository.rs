//! SQLite implementation of the task type registry storage port (C4).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::TaskType;
use crate::domain::ports::{TaskTypeRepository, TaskTypeUsage};

#[derive(Clone)]
pub struct SqliteTaskTypeRepository {
    pool: SqlitePool,
}

impl SqliteTaskTypeRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskTypeRow {
    id: i64,
    name: String,
    version: String,
    param_schema: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskTypeRow> for TaskType {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: TaskTypeRow) -> Result<Self, Self::Error> {
        Ok(TaskType {
            id: row.id,
            name: row.name,
            version: row.version,
            param_schema: serde_json::from_str(&row.param_schema)?,
            is_active: row.is_active,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, crate::domain::errors::DomainError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::domain::errors::DomainError::Fatal(format!("invalid stored timestamp: {e}")))
}

#[async_trait]
impl TaskTypeRepository for SqliteTaskTypeRepository {
    async fn register(&self, name: &str, version: &str, schema: Value) -> DomainResult<TaskType> {
        let schema_json = serde_json::to_string(&schema)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r"INSERT INTO task_types (name, version, param_schema, is_active, created_at, updated_at)
               VALUES (?, ?, ?, 1, ?, ?)
               ON CONFLICT(name) DO UPDATE SET
                 version = excluded.version,
                 param_schema = excluded.param_schema,
                 is_active = 1,
                 updated_at = excluded.updated_at",
        )
        .bind(name)
        .bind(version)
        .bind(&schema_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_by_name(name)
            .await?
            .ok_or_else(|| crate::domain::errors::DomainError::Fatal("upsert did not persist".to_string()))
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<TaskType>> {
        let row: Option<TaskTypeRow> = sqlx::query_as("SELECT * FROM task_types WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TaskType::try_from).transpose()
    }

    async fn get(&self, id: i64) -> DomainResult<Option<TaskType>> {
        let row: Option<TaskTypeRow> = sqlx::query_as("SELECT * FROM task_types WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TaskType::try_from).transpose()
    }

    async fn list(&self, active_only: bool) -> DomainResult<Vec<TaskTypeUsage>> {
        let query = if active_only {
            "SELECT * FROM task_types WHERE is_active = 1 ORDER BY name"
        } else {
            "SELECT * FROM task_types ORDER BY name"
        };
        let rows: Vec<TaskTypeRow> = sqlx::query_as(query).fetch_all(&self.pool).await?;

        let mut usages = Vec::with_capacity(rows.len());
        for row in rows {
            let task_type = TaskType::try_from(row)?;
            let usage: (i64, Option<String>) =
                sqlx::query_as("SELECT COUNT(*), MAX(created_at) FROM tasks WHERE type_id = ?")
                    .bind(task_type.id)
                    .fetch_one(&self.pool)
                    .await?;
            let last_used_at = usage.1.map(|s| parse_datetime(&s)).transpose()?;
            usages.push(TaskTypeUsage { task_type, task_count: usage.0, last_used_at });
        }
        Ok(usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::create_migrated_test_pool;
    use serde_json::json;

    #[tokio::test]
    async fn register_then_fetch_by_name() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteTaskTypeRepository::new(pool);

        let registered = repo.register("image.resize", "1.0.0", json!({"type": "object"})).await.unwrap();
        assert_eq!(registered.name, "image.resize");

        let fetched = repo.get_by_name("image.resize").await.unwrap().unwrap();
        assert_eq!(fetched.id, registered.id);
        assert_eq!(fetched.version, "1.0.0");
    }

    #[tokio::test]
    async fn re_register_upgrades_version_in_place() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteTaskTypeRepository::new(pool);

        let first = repo.register("image.resize", "1.0.0", json!({"type": "object"})).await.unwrap();
        let second = repo.register("image.resize", "2.0.0", json!({"type": "object"})).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.version, "2.0.0");
    }

    #[tokio::test]
    async fn list_reports_task_count_without_cached_pointer() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteTaskTypeRepository::new(pool.clone());
        let task_type = repo.register("echo", "1.0.0", json!({"type": "object"})).await.unwrap();

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO tasks (type_id, status, params_json, dedupe_key, priority, progress, attempts, created_at, updated_at)
             VALUES (?, 'pending', '{}', 'k1', 0, 0, 0, ?, ?)",
        )
        .bind(task_type.id)
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        let usages = repo.list(true).await.unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].task_count, 1);
        assert!(usages[0].last_used_at.is_some());
    }
}
