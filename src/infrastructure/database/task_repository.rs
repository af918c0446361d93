//! SQLite implementation of the task storage adapter (C1).
//!
//! SQLite has no `SELECT ... FOR UPDATE SKIP LOCKED`; the writer lock
//! serializes contenders instead, which spec §4.5 step 3 explicitly allows
//! as a fallback. The claim itself is a single parameterized
//! `UPDATE ... WHERE id = ? AND status = 'pending'` gated by
//! `rows_affected()`, so two concurrent claimants can never both observe
//! success for the same row even without row-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult, StorageError};
use crate::domain::models::{ClaimPolicy, Task, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    type_id: i64,
    status: String,
    params_json: String,
    dedupe_key: String,
    result_json: Option<String>,
    error_message: Option<String>,
    priority: i64,
    progress: i64,
    attempts: i64,
    claimed_by: Option<String>,
    claimed_at: Option<String>,
    completed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::Fatal(format!("invalid stored status: {}", row.status)))?;
        let params = serde_json::from_str(&row.params_json)?;
        let result = row.result_json.map(|s| serde_json::from_str(&s)).transpose()?;

        Ok(Task {
            id: row.id,
            type_id: row.type_id,
            status,
            params,
            dedupe_key: row.dedupe_key,
            result,
            error_message: row.error_message,
            priority: row.priority,
            progress: row.progress as i32,
            attempts: row.attempts,
            claimed_by: row.claimed_by,
            claimed_at: parse_optional_datetime(row.claimed_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::Fatal(format!("invalid stored timestamp: {e}")))
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, DomainError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<(Task, bool)> {
        let params_json = serde_json::to_string(&task.params)?;
        let now = task.created_at.to_rfc3339();

        let result = sqlx::query(
            r"INSERT INTO tasks (type_id, status, params_json, dedupe_key, priority, progress, attempts, created_at, updated_at)
               VALUES (?, 'pending', ?, ?, ?, 0, 0, ?, ?)",
        )
        .bind(task.type_id)
        .bind(&params_json)
        .bind(&task.dedupe_key)
        .bind(task.priority)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(inserted) => {
                let id = inserted.last_insert_rowid();
                let stored = self.get(id).await?.ok_or_else(|| DomainError::Fatal("insert did not persist".to_string()))?;
                Ok((stored, false))
            }
            Err(err) => match StorageError::from(err) {
                StorageError::UniqueViolation(_) => {
                    let existing = self
                        .get_by_dedupe_key(&task.dedupe_key)
                        .await?
                        .ok_or_else(|| DomainError::Fatal("unique violation but row not found".to_string()))?;
                    Ok((existing, true))
                }
                other => Err(other.into()),
            },
        }
    }

    async fn get_by_dedupe_key(&self, dedupe_key: &str) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE dedupe_key = ?")
            .bind(dedupe_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn get(&self, id: i64) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.type_id.is_some() {
            query.push_str(" AND type_id = ?");
        }
        query.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(type_id) = filter.type_id {
            q = q.bind(type_id);
        }
        let limit = if filter.limit > 0 { filter.limit } else { 50 };
        q = q.bind(limit).bind(filter.offset);

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    async fn claim_next(&self, worker_id: &str, policy: &ClaimPolicy) -> DomainResult<Option<Task>> {
        let mut select = String::from("SELECT t.id FROM tasks t WHERE t.status = 'pending'");
        if policy.task_type_id.is_some() {
            select.push_str(" AND t.type_id = ?");
        }
        if policy.type_pattern.is_some() {
            select.push_str(" AND t.type_id IN (SELECT id FROM task_types WHERE name LIKE ?)");
        }
        select.push_str(&format!(" ORDER BY t.{} LIMIT 1", policy.order_by_clause()));

        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        let mut q = sqlx::query_as::<_, (i64,)>(&select);
        if let Some(type_id) = policy.task_type_id {
            q = q.bind(type_id);
        }
        if let Some(pattern) = &policy.type_pattern {
            q = q.bind(pattern.clone());
        }
        let candidate: Option<(i64,)> = q.fetch_optional(&mut *tx).await.map_err(StorageError::from)?;

        let Some((task_id,)) = candidate else {
            tx.commit().await.map_err(StorageError::from)?;
            return Ok(None);
        };

        let now = Utc::now().to_rfc3339();
        let updated = sqlx::query(
            r"UPDATE tasks SET status = 'claimed', claimed_by = ?, claimed_at = ?, attempts = attempts + 1, updated_at = ?
               WHERE id = ? AND status = 'pending'",
        )
        .bind(worker_id)
        .bind(&now)
        .bind(&now)
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::from)?;

        if updated.rows_affected() == 0 {
            tx.commit().await.map_err(StorageError::from)?;
            return Ok(None);
        }

        tx.commit().await.map_err(StorageError::from)?;
        self.get(task_id).await
    }

    async fn update_progress(&self, task_id: i64, worker_id: &str, progress: i32) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE tasks SET progress = ?, updated_at = ? WHERE id = ? AND status = 'claimed' AND claimed_by = ?",
        )
        .bind(progress)
        .bind(&now)
        .bind(task_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_completed(&self, task_id: i64, worker_id: &str, result: Option<serde_json::Value>) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result_json = result.map(|v| serde_json::to_string(&v)).transpose()?;
        let updated = sqlx::query(
            r"UPDATE tasks SET status = 'completed', result_json = ?, progress = 100, completed_at = ?, updated_at = ?
               WHERE id = ? AND status = 'claimed' AND claimed_by = ?",
        )
        .bind(result_json)
        .bind(&now)
        .bind(&now)
        .bind(task_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn requeue(&self, task_id: i64, worker_id: &str, error_message: &str) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let updated = sqlx::query(
            r"UPDATE tasks SET status = 'pending', claimed_by = NULL, claimed_at = NULL, error_message = ?, updated_at = ?
               WHERE id = ? AND status = 'claimed' AND claimed_by = ?",
        )
        .bind(error_message)
        .bind(&now)
        .bind(task_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn mark_failed(&self, task_id: i64, worker_id: &str, error_message: &str) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let updated = sqlx::query(
            r"UPDATE tasks SET status = 'failed', error_message = ?, completed_at = ?, updated_at = ?
               WHERE id = ? AND status = 'claimed' AND claimed_by = ?",
        )
        .bind(error_message)
        .bind(&now)
        .bind(&now)
        .bind(task_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn reclaim_expired(&self, claim_timeout_secs: i64, max_task_attempts: i64) -> DomainResult<u64> {
        let now = Utc::now().to_rfc3339();
        let cutoff = (Utc::now() - chrono::Duration::seconds(claim_timeout_secs)).to_rfc3339();

        let requeued = sqlx::query(
            r"UPDATE tasks SET status = 'pending', claimed_by = NULL, claimed_at = NULL,
                 error_message = 'reclaimed after claim timeout', updated_at = ?
               WHERE status = 'claimed' AND claimed_at < ? AND attempts < ?",
        )
        .bind(&now)
        .bind(&cutoff)
        .bind(max_task_attempts)
        .execute(&self.pool)
        .await?;

        let failed = sqlx::query(
            r"UPDATE tasks SET status = 'failed', error_message = 'reclaimed after claim timeout', completed_at = ?, updated_at = ?
               WHERE status = 'claimed' AND claimed_at < ? AND attempts >= ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(&cutoff)
        .bind(max_task_attempts)
        .execute(&self.pool)
        .await?;

        Ok(requeued.rows_affected() + failed.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::TaskFilter;
    use crate::infrastructure::database::create_migrated_test_pool;
    use serde_json::json;

    async fn repo_with_type() -> (SqliteTaskRepository, i64) {
        let pool = create_migrated_test_pool().await.unwrap();
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO task_types (name, version, param_schema, is_active, created_at, updated_at) VALUES (?, '1.0.0', '{\"type\":\"object\"}', 1, ?, ?)")
            .bind("t.echo")
            .bind(&now)
            .bind(&now)
            .execute(&pool)
            .await
            .unwrap();
        (SqliteTaskRepository::new(pool), 1)
    }

    fn new_task(type_id: i64, key: &str) -> Task {
        Task::new(type_id, json!({"msg": "hi"}), key.to_string(), 0)
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let (repo, type_id) = repo_with_type().await;
        let (stored, dedup) = repo.create(&new_task(type_id, "key1")).await.unwrap();
        assert!(!dedup);
        let fetched = repo.get(stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.dedupe_key, "key1");
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_dedupe_key_returns_existing_row() {
        let (repo, type_id) = repo_with_type().await;
        let (first, first_dedup) = repo.create(&new_task(type_id, "dupkey")).await.unwrap();
        let (second, second_dedup) = repo.create(&new_task(type_id, "dupkey")).await.unwrap();
        assert!(!first_dedup);
        assert!(second_dedup);
        assert_eq!(first.id, second.id);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks").fetch_one(&repo.pool).await.unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn claim_next_marks_pending_task_claimed() {
        let (repo, type_id) = repo_with_type().await;
        let (task, _) = repo.create(&new_task(type_id, "claim1")).await.unwrap();

        let claimed = repo.claim_next("worker-a", &ClaimPolicy::default()).await.unwrap().unwrap();
        assert_eq!(claimed.id, task.id);
        assert_eq!(claimed.status, TaskStatus::Claimed);
        assert_eq!(claimed.claimed_by.as_deref(), Some("worker-a"));
        assert_eq!(claimed.attempts, 1);
    }

    #[tokio::test]
    async fn double_claim_returns_none_second_time() {
        let (repo, type_id) = repo_with_type().await;
        repo.create(&new_task(type_id, "claim2")).await.unwrap();

        let first = repo.claim_next("worker-a", &ClaimPolicy::default()).await.unwrap();
        assert!(first.is_some());
        let second = repo.claim_next("worker-b", &ClaimPolicy::default()).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn complete_success_sets_terminal_state() {
        let (repo, type_id) = repo_with_type().await;
        repo.create(&new_task(type_id, "complete1")).await.unwrap();
        let claimed = repo.claim_next("worker-a", &ClaimPolicy::default()).await.unwrap().unwrap();

        let ok = repo.mark_completed(claimed.id, "worker-a", Some(json!({"echoed": "hi"}))).await.unwrap();
        assert!(ok);

        let fetched = repo.get(claimed.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert_eq!(fetched.progress, 100);
        assert!(fetched.completed_at.is_some());
    }

    #[tokio::test]
    async fn requeue_then_fail_respects_attempt_bound() {
        let (repo, type_id) = repo_with_type().await;
        repo.create(&new_task(type_id, "retry1")).await.unwrap();

        let claimed = repo.claim_next("w1", &ClaimPolicy::default()).await.unwrap().unwrap();
        assert_eq!(claimed.attempts, 1);
        repo.requeue(claimed.id, "w1", "e1").await.unwrap();

        let reclaimed = repo.claim_next("w2", &ClaimPolicy::default()).await.unwrap().unwrap();
        assert_eq!(reclaimed.attempts, 2);
        let ok = repo.mark_failed(reclaimed.id, "w2", "e2").await.unwrap();
        assert!(ok);

        let fetched = repo.get(reclaimed.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Failed);
        assert_eq!(fetched.error_message.as_deref(), Some("e2"));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let (repo, type_id) = repo_with_type().await;
        repo.create(&new_task(type_id, "list1")).await.unwrap();
        repo.create(&new_task(type_id, "list2")).await.unwrap();
        repo.claim_next("w1", &ClaimPolicy::default()).await.unwrap();

        let pending = repo
            .list(TaskFilter { status: Some(TaskStatus::Pending), type_id: None, limit: 50, offset: 0 })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }
}
