//! Router/validator configuration storage port (C8/C7).

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ApiEndpoint, ApiValidation};

#[async_trait]
pub trait EndpointRepository: Send + Sync {
    /// All routes, in ascending `load_order`.
    async fn list_endpoints(&self) -> DomainResult<Vec<ApiEndpoint>>;

    /// Validation rules for one endpoint.
    async fn list_validations(&self, endpoint_id: i64) -> DomainResult<Vec<ApiValidation>>;

    /// Seed the default endpoint/validation set when the tables are empty.
    /// Idempotent: a populated table is left untouched.
    async fn seed_defaults_if_empty(&self) -> DomainResult<()>;
}
