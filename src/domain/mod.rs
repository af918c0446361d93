//! Domain layer.
//!
//! Core entities, port traits, and the error taxonomy. Framework-agnostic:
//! nothing here knows about SQLite or HTTP.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, StorageError, Violation};
