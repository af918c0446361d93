//! Shared state injected into every request handler.

use std::sync::Arc;

use crate::domain::ports::EndpointRepository;
use crate::services::{LifecycleEngine, TaskRegistry};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    pub registry: Arc<TaskRegistry>,
    pub endpoints: Arc<dyn EndpointRepository>,
    pub api_key: Arc<String>,
}
