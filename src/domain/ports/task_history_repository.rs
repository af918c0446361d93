//! Audit trail storage port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

#[async_trait]
pub trait TaskHistoryRepository: Send + Sync {
    /// Record a status transition. A no-op when history writing is
    /// disabled by configuration at the call site.
    async fn record(
        &self,
        task_id: i64,
        from_status: Option<&str>,
        status_change: &str,
        worker_id: Option<&str>,
        message: Option<&str>,
    ) -> DomainResult<()>;
}
