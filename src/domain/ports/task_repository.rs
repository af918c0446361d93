//! Storage adapter port for tasks (C1).

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ClaimPolicy, Task, TaskStatus};

/// Filter criteria for listing tasks (`GET /tasks`).
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub type_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

/// Typed SQL access over the `tasks` relation. All writes go through
/// prepared statements.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new pending task. On a `dedupe_key` collision, fetches and
    /// returns the existing row instead with the second element `true`.
    async fn create(&self, task: &Task) -> DomainResult<(Task, bool)>;

    /// Fetch the existing row carrying `dedupe_key`, if any.
    async fn get_by_dedupe_key(&self, dedupe_key: &str) -> DomainResult<Option<Task>>;

    async fn get(&self, id: i64) -> DomainResult<Option<Task>>;

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>>;

    /// Atomically claim one eligible `pending` task matching `policy`,
    /// marking it `claimed` by `worker_id` and incrementing `attempts`.
    /// Returns `None` if no eligible row exists.
    async fn claim_next(&self, worker_id: &str, policy: &ClaimPolicy) -> DomainResult<Option<Task>>;

    /// Update `progress` for a task still held by `worker_id`. Returns
    /// `false` if the task is not claimed by that worker (caller maps to
    /// `WrongState`/`WrongOwner`).
    async fn update_progress(&self, task_id: i64, worker_id: &str, progress: i32) -> DomainResult<bool>;

    /// Transition a claimed task to `completed`.
    async fn mark_completed(&self, task_id: i64, worker_id: &str, result: Option<serde_json::Value>) -> DomainResult<bool>;

    /// Re-queue a claimed task to `pending` after a failed attempt that
    /// has not yet exhausted `MaxTaskAttempts`.
    async fn requeue(&self, task_id: i64, worker_id: &str, error_message: &str) -> DomainResult<bool>;

    /// Transition a claimed task to terminal `failed`.
    async fn mark_failed(&self, task_id: i64, worker_id: &str, error_message: &str) -> DomainResult<bool>;

    /// Find tasks claimed past `claim_timeout_secs` and reclaim each: the
    /// same re-queue-vs-fail policy as a worker-reported failure. Returns
    /// the count of rows affected.
    async fn reclaim_expired(&self, claim_timeout_secs: i64, max_task_attempts: i64) -> DomainResult<u64>;
}
