//! Use-case services behind the domain ports.

pub mod claim_policy;
pub mod dedupe_keyer;
pub mod json_schema_validator;
pub mod lifecycle_engine;
pub mod request_validator;
pub mod task_registry;

pub use claim_policy::{compose as compose_claim_policy, ClaimRequest};
pub use lifecycle_engine::{CompleteOutcome, LifecycleEngine, SubmitOutcome};
pub use request_validator::RequestContext;
pub use task_registry::TaskRegistry;
