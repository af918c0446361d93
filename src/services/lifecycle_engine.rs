//! The task lifecycle engine (C5) — submit, claim, progress, complete/fail,
//! retry, timeout-reclaim. The central component; every mutation to a task
//! passes through here rather than touching the storage adapter directly.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::errors::DomainError;
use crate::domain::models::{ClaimPolicy, Task};
use crate::domain::ports::{TaskFilter, TaskHistoryRepository, TaskRepository, TaskTypeRepository};
use crate::services::{dedupe_keyer, json_schema_validator};

/// Result of a `Submit` call.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub task: Task,
    pub deduplicated: bool,
}

/// Result of a `Complete` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteOutcome {
    Completed,
    Requeued,
    Failed,
}

pub struct LifecycleEngine {
    tasks: Arc<dyn TaskRepository>,
    task_types: Arc<dyn TaskTypeRepository>,
    history: Arc<dyn TaskHistoryRepository>,
    max_task_attempts: i64,
    claim_timeout_secs: i64,
    history_enabled: bool,
}

impl LifecycleEngine {
    #[must_use]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        task_types: Arc<dyn TaskTypeRepository>,
        history: Arc<dyn TaskHistoryRepository>,
        max_task_attempts: i64,
        claim_timeout_secs: i64,
        history_enabled: bool,
    ) -> Self {
        Self {
            tasks,
            task_types,
            history,
            max_task_attempts,
            claim_timeout_secs,
            history_enabled,
        }
    }

    /// Resolve the type, validate params, compute the dedupe key, and
    /// insert — or, on a dedupe hit, return the existing row. Dedupe is not
    /// an error: it is reported via `deduplicated: true`.
    pub async fn submit(&self, type_name: &str, params: Value, priority: i64) -> Result<SubmitOutcome, DomainError> {
        let task_type = self
            .task_types
            .get_by_name(type_name)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| DomainError::UnknownType(type_name.to_string()))?;

        let filled_params = json_schema_validator::validate(&task_type.param_schema, &params).map_err(DomainError::Validation)?;

        let dedupe_key = dedupe_keyer::compute(type_name, &filled_params);
        let task = Task::new(task_type.id, filled_params, dedupe_key, priority);

        let (stored, deduplicated) = self.tasks.create(&task).await?;

        if !deduplicated && self.history_enabled {
            self.history
                .record(stored.id, None, stored.status.as_str(), None, None)
                .await?;
        }

        Ok(SubmitOutcome { task: stored, deduplicated })
    }

    /// Exactly-once-at-a-time claim: the storage adapter performs the
    /// locked select-and-update; this layer only validates the policy and
    /// records history.
    pub async fn claim(&self, worker_id: &str, policy: &ClaimPolicy) -> Result<Option<Task>, DomainError> {
        let claimed = self.tasks.claim_next(worker_id, policy).await?;

        if let Some(task) = &claimed {
            if self.history_enabled {
                self.history
                    .record(task.id, Some("pending"), "claimed", Some(worker_id), None)
                    .await?;
            }
        }

        Ok(claimed)
    }

    /// Idempotent: re-applying the same progress value is a no-op from the
    /// caller's perspective (the repository's `WHERE` clause still matches
    /// and returns success, but no new history/side effect is implied).
    pub async fn update_progress(&self, task_id: i64, worker_id: &str, progress: i32) -> Result<(), DomainError> {
        if !(0..=100).contains(&progress) {
            return Err(DomainError::BadRequest("progress must be within [0, 100]".to_string()));
        }

        let ok = self.tasks.update_progress(task_id, worker_id, progress).await?;
        if !ok {
            return Err(self.wrong_state_or_owner(task_id, worker_id).await);
        }
        Ok(())
    }

    /// Requires the task be `claimed` by `worker_id`. On failure, re-queues
    /// while `attempts < MaxTaskAttempts`, else terminally fails.
    pub async fn complete(
        &self,
        task_id: i64,
        worker_id: &str,
        success: bool,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<CompleteOutcome, DomainError> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("task #{task_id}")))?;

        if task.status.is_terminal() {
            return Err(DomainError::WrongState(format!("task #{task_id} is already {}", task.status.as_str())));
        }

        if success {
            let ok = self.tasks.mark_completed(task_id, worker_id, result).await?;
            if !ok {
                return Err(self.wrong_state_or_owner(task_id, worker_id).await);
            }
            if self.history_enabled {
                self.history.record(task_id, Some("claimed"), "completed", Some(worker_id), None).await?;
            }
            return Ok(CompleteOutcome::Completed);
        }

        let error_message = error.unwrap_or_default();
        if task.attempts < self.max_task_attempts {
            let ok = self.tasks.requeue(task_id, worker_id, &error_message).await?;
            if !ok {
                return Err(self.wrong_state_or_owner(task_id, worker_id).await);
            }
            if self.history_enabled {
                self.history
                    .record(task_id, Some("claimed"), "pending", Some(worker_id), Some(&error_message))
                    .await?;
            }
            Ok(CompleteOutcome::Requeued)
        } else {
            let ok = self.tasks.mark_failed(task_id, worker_id, &error_message).await?;
            if !ok {
                return Err(self.wrong_state_or_owner(task_id, worker_id).await);
            }
            if self.history_enabled {
                self.history
                    .record(task_id, Some("claimed"), "failed", Some(worker_id), Some(&error_message))
                    .await?;
            }
            Ok(CompleteOutcome::Failed)
        }
    }

    /// Reclaims tasks claimed past `ClaimTimeout`, applying the same
    /// re-queue-vs-fail policy as a reported failure. Idempotent: rows
    /// already reclaimed are simply no longer eligible.
    pub async fn reclaim_expired(&self) -> Result<u64, DomainError> {
        self.tasks.reclaim_expired(self.claim_timeout_secs, self.max_task_attempts).await
    }

    pub async fn get(&self, task_id: i64) -> Result<Task, DomainError> {
        self.tasks.get(task_id).await?.ok_or_else(|| DomainError::NotFound(format!("task #{task_id}")))
    }

    /// `GET /tasks` — a thin pass-through to the storage adapter's filtered
    /// listing; no lifecycle semantics apply to a read.
    pub async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>, DomainError> {
        self.tasks.list(filter).await
    }

    /// Distinguish "wrong state" (not claimed / terminal) from "wrong
    /// owner" (claimed by someone else) for the 409 response.
    async fn wrong_state_or_owner(&self, task_id: i64, worker_id: &str) -> DomainError {
        match self.tasks.get(task_id).await {
            Ok(Some(task)) if task.claimed_by.as_deref() == Some(worker_id) => {
                DomainError::WrongState(format!("task #{task_id} is {}", task.status.as_str()))
            }
            Ok(Some(_)) => DomainError::WrongOwner(format!("task #{task_id} is not claimed by {worker_id}")),
            Ok(None) => DomainError::NotFound(format!("task #{task_id}")),
            Err(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;
    use crate::domain::models::{ClaimPolicy, TaskStatus};
    use crate::infrastructure::database::{
        create_migrated_test_pool, SqliteTaskHistoryRepository, SqliteTaskRepository, SqliteTaskTypeRepository,
    };
    use crate::services::task_registry::TaskRegistry;

    async fn harness(max_task_attempts: i64, claim_timeout_secs: i64) -> (LifecycleEngine, TaskRegistry) {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let task_types = Arc::new(SqliteTaskTypeRepository::new(pool.clone()));
        let history: Arc<dyn TaskHistoryRepository> = Arc::new(SqliteTaskHistoryRepository::new(pool));
        let engine = LifecycleEngine::new(tasks, task_types.clone(), history, max_task_attempts, claim_timeout_secs, true);
        let registry = TaskRegistry::new(task_types);
        (engine, registry)
    }

    fn echo_schema() -> Value {
        json!({
            "type": "object",
            "properties": { "msg": { "type": "string" } },
            "required": ["msg"],
        })
    }

    /// Scenario 1 (§8): register, submit, claim, complete.
    #[tokio::test]
    async fn happy_path_register_submit_claim_complete() {
        let (engine, registry) = harness(3, 300).await;
        registry.register("t.echo", "1.0.0", echo_schema()).await.unwrap();

        let submitted = engine.submit("t.echo", json!({"msg": "hi"}), 0).await.unwrap();
        assert!(!submitted.deduplicated);
        assert_eq!(submitted.task.status, TaskStatus::Pending);

        let claimed = engine
            .claim("w1", &ClaimPolicy::default())
            .await
            .unwrap()
            .expect("one pending task to claim");
        assert_eq!(claimed.id, submitted.task.id);
        assert_eq!(claimed.status, TaskStatus::Claimed);
        assert_eq!(claimed.attempts, 1);

        let outcome = engine
            .complete(claimed.id, "w1", true, Some(json!({"echoed": "hi"})), None)
            .await
            .unwrap();
        assert_eq!(outcome, CompleteOutcome::Completed);

        let finished = engine.get(claimed.id).await.unwrap();
        assert_eq!(finished.status, TaskStatus::Completed);
        assert_eq!(finished.progress, 100);
        assert_eq!(finished.result, Some(json!({"echoed": "hi"})));
    }

    /// Scenario 2 (§8): identical submissions dedupe to a single row.
    #[tokio::test]
    async fn submit_deduplicates_identical_params() {
        let (engine, registry) = harness(3, 300).await;
        registry.register("t.echo", "1.0.0", echo_schema()).await.unwrap();

        let first = engine.submit("t.echo", json!({"msg": "hi"}), 0).await.unwrap();
        let second = engine.submit("t.echo", json!({"msg": "hi"}), 0).await.unwrap();

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.task.id, second.task.id);

        let all = engine.list(TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    /// Scenario 3 (§8): missing required param fails validation, no row created.
    #[tokio::test]
    async fn submit_with_missing_required_param_is_rejected() {
        let (engine, registry) = harness(3, 300).await;
        registry.register("t.echo", "1.0.0", echo_schema()).await.unwrap();

        let err = engine.submit("t.echo", json!({}), 0).await.unwrap_err();
        match err {
            DomainError::Validation(violations) => {
                assert!(violations.iter().any(|v| v.path == "msg" && v.rule == "required"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }

        assert!(engine.list(TaskFilter::default()).await.unwrap().is_empty());
    }

    /// Submitting against an unregistered (or deactivated) type is ErrUnknownType.
    #[tokio::test]
    async fn submit_unknown_type_is_rejected() {
        let (engine, _registry) = harness(3, 300).await;
        let err = engine.submit("t.nope", json!({}), 0).await.unwrap_err();
        assert!(matches!(err, DomainError::UnknownType(name) if name == "t.nope"));
    }

    /// Scenario 4 (§8): concurrent claims on a fixed pool of tasks hand out
    /// each task to exactly one worker.
    #[tokio::test]
    async fn concurrent_claims_never_double_assign() {
        let (engine, registry) = harness(3, 300).await;
        registry.register("t.echo", "1.0.0", echo_schema()).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..3 {
            let outcome = engine.submit("t.echo", json!({"msg": format!("task-{i}")}), 0).await.unwrap();
            ids.push(outcome.task.id);
        }

        let engine = Arc::new(engine);
        let mut handles = Vec::new();
        for i in 0..5 {
            let engine = engine.clone();
            let worker_id = format!("worker-{i}");
            handles.push(tokio::spawn(async move { engine.claim(&worker_id, &ClaimPolicy::default()).await.unwrap() }));
        }

        let mut claimed_ids = HashSet::new();
        let mut claim_count = 0;
        for handle in handles {
            if let Some(task) = handle.await.unwrap() {
                claim_count += 1;
                assert!(claimed_ids.insert(task.id), "task {} claimed twice", task.id);
            }
        }

        assert_eq!(claim_count, 3);
        assert_eq!(claimed_ids, ids.into_iter().collect::<HashSet<_>>());
    }

    /// Scenario 5 (§8): retry then terminal fail at the attempt bound.
    #[tokio::test]
    async fn retry_then_terminal_fail_at_attempt_bound() {
        let (engine, registry) = harness(2, 300).await;
        registry.register("t.echo", "1.0.0", echo_schema()).await.unwrap();
        let submitted = engine.submit("t.echo", json!({"msg": "hi"}), 0).await.unwrap();

        let claimed = engine.claim("w1", &ClaimPolicy::default()).await.unwrap().unwrap();
        assert_eq!(claimed.attempts, 1);
        let outcome = engine.complete(claimed.id, "w1", false, None, Some("e1".to_string())).await.unwrap();
        assert_eq!(outcome, CompleteOutcome::Requeued);

        let requeued = engine.get(submitted.task.id).await.unwrap();
        assert_eq!(requeued.status, TaskStatus::Pending);
        assert_eq!(requeued.attempts, 1);

        let reclaimed = engine.claim("w2", &ClaimPolicy::default()).await.unwrap().unwrap();
        assert_eq!(reclaimed.attempts, 2);
        let outcome = engine.complete(reclaimed.id, "w2", false, None, Some("e2".to_string())).await.unwrap();
        assert_eq!(outcome, CompleteOutcome::Failed);

        let failed = engine.get(submitted.task.id).await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.attempts, 2);
        assert_eq!(failed.error_message.as_deref(), Some("e2"));
    }

    /// Scenario 6 (§8): a claim abandoned past `ClaimTimeout` is recovered
    /// by `ReclaimExpired` and can be claimed again by a different worker.
    #[tokio::test]
    async fn reclaim_expired_recovers_dead_worker_claim() {
        let (engine, registry) = harness(3, 0).await;
        registry.register("t.echo", "1.0.0", echo_schema()).await.unwrap();
        engine.submit("t.echo", json!({"msg": "hi"}), 0).await.unwrap();

        engine.claim("w1", &ClaimPolicy::default()).await.unwrap().expect("claimed by w1");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let reclaimed_count = engine.reclaim_expired().await.unwrap();
        assert_eq!(reclaimed_count, 1);

        let again = engine.reclaim_expired().await.unwrap();
        assert_eq!(again, 0, "ReclaimExpired is idempotent over already-reclaimed rows");

        let recovered = engine.claim("w2", &ClaimPolicy::default()).await.unwrap().expect("claimable by w2");
        assert_eq!(recovered.claimed_by.as_deref(), Some("w2"));
    }

    /// `UpdateProgress` requires ownership and clamps to the documented range.
    #[tokio::test]
    async fn update_progress_requires_ownership_and_range() {
        let (engine, registry) = harness(3, 300).await;
        registry.register("t.echo", "1.0.0", echo_schema()).await.unwrap();
        let submitted = engine.submit("t.echo", json!({"msg": "hi"}), 0).await.unwrap();
        let claimed = engine.claim("w1", &ClaimPolicy::default()).await.unwrap().unwrap();

        let err = engine.update_progress(claimed.id, "w1", 150).await.unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));

        engine.update_progress(claimed.id, "w1", 50).await.unwrap();
        assert_eq!(engine.get(submitted.task.id).await.unwrap().progress, 50);

        let err = engine.update_progress(claimed.id, "w2", 60).await.unwrap_err();
        assert!(matches!(err, DomainError::WrongOwner(_)));
    }

    /// Completing a terminal task is `ErrWrongState`; terminal tasks never
    /// resurrect.
    #[tokio::test]
    async fn completing_a_terminal_task_is_wrong_state() {
        let (engine, registry) = harness(3, 300).await;
        registry.register("t.echo", "1.0.0", echo_schema()).await.unwrap();
        engine.submit("t.echo", json!({"msg": "hi"}), 0).await.unwrap();
        let claimed = engine.claim("w1", &ClaimPolicy::default()).await.unwrap().unwrap();
        engine.complete(claimed.id, "w1", true, Some(json!({})), None).await.unwrap();

        let err = engine.complete(claimed.id, "w1", true, Some(json!({})), None).await.unwrap_err();
        assert!(matches!(err, DomainError::WrongState(_)));
    }
}
