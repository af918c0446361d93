//! Whitelist-validated assembly of the claim query's ordering and filters (C6).

use crate::domain::errors::DomainError;
use crate::domain::models::{ClaimPolicy, SortBy, SortOrder};

/// Raw claim request fields as received over the wire, before validation.
#[derive(Debug, Clone, Default)]
pub struct ClaimRequest {
    pub task_type_id: Option<i64>,
    pub type_pattern: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Validate `sort_by`/`sort_order` against the compile-time whitelist and
/// compose a [`ClaimPolicy`]. Any value outside the whitelist is rejected —
/// never interpolated into SQL.
pub fn compose(req: &ClaimRequest) -> Result<ClaimPolicy, DomainError> {
    let sort_by = match &req.sort_by {
        Some(s) => SortBy::parse(s).ok_or_else(|| DomainError::BadRequest(format!("sort_by: {s}")))?,
        None => SortBy::CreatedAt,
    };
    let sort_order = match &req.sort_order {
        Some(s) => SortOrder::parse(s).ok_or_else(|| DomainError::BadRequest(format!("sort_order: {s}")))?,
        None => SortOrder::Asc,
    };

    Ok(ClaimPolicy {
        sort_by,
        sort_order,
        task_type_id: req.task_type_id,
        type_pattern: req.type_pattern.clone(),
    })
}
