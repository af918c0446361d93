//! Register/update/list task types and their schemas (C4).

use std::sync::Arc;

use serde_json::Value;

use crate::domain::errors::DomainError;
use crate::domain::models::TaskType;
use crate::domain::ports::{TaskTypeRepository, TaskTypeUsage};
use crate::services::json_schema_validator;

pub struct TaskRegistry {
    repo: Arc<dyn TaskTypeRepository>,
}

impl TaskRegistry {
    #[must_use]
    pub fn new(repo: Arc<dyn TaskTypeRepository>) -> Self {
        Self { repo }
    }

    /// Upserts by `name`. Rejects schemas that are not a JSON object with a
    /// top-level `type`.
    pub async fn register(&self, name: &str, version: &str, schema: Value) -> Result<TaskType, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::BadRequest("task type name must not be empty".to_string()));
        }
        if !json_schema_validator::has_valid_shape(&schema) {
            return Err(DomainError::BadRequest(
                "param_schema must be a JSON object with a top-level `type`".to_string(),
            ));
        }
        self.repo.register(name, version, schema).await
    }

    pub async fn get(&self, name: &str) -> Result<TaskType, DomainError> {
        self.repo
            .get_by_name(name)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("task type '{name}'")))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<TaskType, DomainError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("task type #{id}")))
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<TaskTypeUsage>, DomainError> {
        self.repo.list(active_only).await
    }
}
