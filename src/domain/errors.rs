//! Domain error taxonomy for the task queue.
//!
//! Kinds, not type names: the HTTP layer maps each variant to the status
//! code from spec §7 via [`DomainError::status_code`]. Storage errors are
//! wrapped into this taxonomy at the adapter boundary (§7 propagation
//! policy) so the engine never matches on driver-specific error types.

use thiserror::Error;

/// A single JSON-Schema or request-validation violation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Violation {
    pub path: String,
    pub rule: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Domain-level errors that can occur in the task queue core.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Request or task params failed schema/shape validation.
    #[error("validation failed")]
    Validation(Vec<Violation>),

    /// Referenced task type is missing or inactive.
    #[error("unknown task type: {0}")]
    UnknownType(String),

    /// Referenced entity (task, history row) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted transition from a non-permitted status.
    #[error("wrong state: {0}")]
    WrongState(String),

    /// Progress/complete attempted by a worker that does not hold the claim.
    #[error("wrong owner: {0}")]
    WrongOwner(String),

    /// A whitelist (e.g. `sort_by`) was violated.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// `X-API-Key` missing or did not match, per spec §6.
    #[error("unauthorized")]
    Unauthorized,

    /// Request body exceeded `MaxRequestSize`.
    #[error("payload too large: {0} bytes (limit {1})")]
    PayloadTooLarge(usize, usize),

    /// Retried in-engine up to twice, then surfaced.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// A storage deadlock; retried in-engine up to twice before surfacing.
    #[error("deadlock detected: {0}")]
    Deadlock(String),

    /// Schema corruption or unreadable stored JSON; not user-recoverable.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// HTTP status mirroring the error kind, per spec §6/§7.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::UnknownType(_) | Self::NotFound(_) => 404,
            Self::WrongState(_) | Self::WrongOwner(_) => 409,
            Self::PayloadTooLarge(_, _) => 413,
            Self::Transient(_) | Self::Deadlock(_) | Self::Fatal(_) => 500,
        }
    }

    /// Short violation strings for the error envelope's `details` array.
    #[must_use]
    pub fn details(&self) -> Option<Vec<String>> {
        match self {
            Self::Validation(violations) => Some(
                violations
                    .iter()
                    .map(|v| format!("{}: {} ({})", v.path, v.message, v.rule))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Storage adapter error kinds (§4.1). A narrower taxonomy than
/// [`DomainError`] — the database layer classifies driver errors into these
/// before the engine decides how to react (retry, surface, wrap).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("row not found")]
    NotFound,
    #[error("foreign key violation: {0}")]
    ForeignKey(String),
    #[error("deadlock, caller may retry: {0}")]
    Deadlock(String),
    #[error("transient error: {0}")]
    Transient(String),
    #[error("fatal storage error: {0}")]
    Fatal(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            // SQLite extended result codes: 2067/1555 = UNIQUE, 787 = FOREIGN KEY,
            // 5/6 = SQLITE_BUSY/LOCKED (contenders serializing on the writer lock).
            if let Some(code) = db_err.code() {
                match code.as_ref() {
                    "2067" | "1555" => return Self::UniqueViolation(db_err.message().to_string()),
                    "787" => return Self::ForeignKey(db_err.message().to_string()),
                    "5" | "6" => return Self::Deadlock(db_err.message().to_string()),
                    _ => {}
                }
            }
        }
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Transient(err.to_string()),
            other => Self::Fatal(other.to_string()),
        }
    }
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound("task".to_string()),
            StorageError::UniqueViolation(msg) => Self::Transient(format!("unique violation: {msg}")),
            StorageError::ForeignKey(msg) => Self::Fatal(format!("foreign key violation: {msg}")),
            StorageError::Deadlock(msg) => Self::Deadlock(msg),
            StorageError::Transient(msg) => Self::Transient(msg),
            StorageError::Fatal(msg) => Self::Fatal(msg),
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::from(err).into()
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Fatal(format!("json error: {err}"))
    }
}
