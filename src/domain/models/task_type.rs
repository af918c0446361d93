//! Task type registration entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A registered task type: a name, a version tag, and the JSON-Schema subset
/// that `params` must satisfy for any task submitted against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskType {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub param_schema: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskType {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, param_schema: Value) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            version: version.into(),
            param_schema,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
