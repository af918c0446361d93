//! Task registry storage port (C4).

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::DomainResult;
use crate::domain::models::TaskType;

/// A [`TaskType`] joined with its usage, computed on demand rather than
/// cached — the spec explicitly forbids a back-pointer from type to tasks.
#[derive(Debug, Clone)]
pub struct TaskTypeUsage {
    pub task_type: TaskType,
    pub task_count: i64,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[async_trait]
pub trait TaskTypeRepository: Send + Sync {
    /// Upsert by `name`: insert if absent, else update version/schema and
    /// reactivate. Serialized by the unique index on `name`.
    async fn register(&self, name: &str, version: &str, schema: Value) -> DomainResult<TaskType>;

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<TaskType>>;

    async fn get(&self, id: i64) -> DomainResult<Option<TaskType>>;

    async fn list(&self, active_only: bool) -> DomainResult<Vec<TaskTypeUsage>>;
}
