//! Whitelisted sort fields for the claim query (§4.6).
//!
//! Any value outside these enums is rejected with `DomainError::BadRequest`
//! before a SQL fragment is ever built — the whitelist is the only
//! sanctioned source of identifiers in the composed ORDER BY clause.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    CreatedAt,
    Priority,
    Id,
    Attempts,
}

impl SortBy {
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Priority => "priority",
            Self::Id => "id",
            Self::Attempts => "attempts",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(Self::CreatedAt),
            "priority" => Some(Self::Priority),
            "id" => Some(Self::Id),
            "attempts" => Some(Self::Attempts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Validated composition of the claim query's ordering and filters.
/// Construction is the only sanctioned path from user input to a query
/// fragment; there is no other way to build one.
#[derive(Debug, Clone)]
pub struct ClaimPolicy {
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub task_type_id: Option<i64>,
    pub type_pattern: Option<String>,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Asc,
            task_type_id: None,
            type_pattern: None,
        }
    }
}

impl ClaimPolicy {
    /// Render the `ORDER BY` fragment. The column and keyword come
    /// exclusively from the whitelisted enums, never from raw input.
    #[must_use]
    pub fn order_by_clause(&self) -> String {
        format!("{} {}", self.sort_by.column(), self.sort_order.keyword())
    }
}
