//! Append-only audit trail for task status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded status transition. Written when `HistoryEnabled` is set;
/// never consulted by the lifecycle engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub id: i64,
    pub task_id: i64,
    pub from_status: Option<String>,
    pub status_change: String,
    pub worker_id: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}
