//! Data-driven endpoint router configuration (C8) and request validator
//! rules (C7). Both are loaded from storage at startup, never hardcoded.

use serde::{Deserialize, Serialize};

/// The core operation a route is bound to. Tagged variants resolved at
/// startup, not a reflective string→handler lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Health,
    RegisterTaskType,
    GetTaskType,
    ListTaskTypes,
    SubmitTask,
    ClaimTask,
    UpdateProgress,
    CompleteTask,
    GetTask,
    ListTasks,
}

impl OperationKind {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "health" => Some(Self::Health),
            "register_task_type" => Some(Self::RegisterTaskType),
            "get_task_type" => Some(Self::GetTaskType),
            "list_task_types" => Some(Self::ListTaskTypes),
            "submit_task" => Some(Self::SubmitTask),
            "claim_task" => Some(Self::ClaimTask),
            "update_progress" => Some(Self::UpdateProgress),
            "complete_task" => Some(Self::CompleteTask),
            "get_task" => Some(Self::GetTask),
            "list_tasks" => Some(Self::ListTasks),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::RegisterTaskType => "register_task_type",
            Self::GetTaskType => "get_task_type",
            Self::ListTaskTypes => "list_task_types",
            Self::SubmitTask => "submit_task",
            Self::ClaimTask => "claim_task",
            Self::UpdateProgress => "update_progress",
            Self::CompleteTask => "complete_task",
            Self::GetTask => "get_task",
            Self::ListTasks => "list_tasks",
        }
    }
}

/// A single registered route, loaded from `api_endpoints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub id: i64,
    pub method: String,
    pub path_template: String,
    pub operation: OperationKind,
    pub load_order: i64,
}

/// Source a validated parameter is drawn from, per spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Body,
    Query,
    Path,
    Header,
}

impl ParamSource {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "body" => Some(Self::Body),
            "query" => Some(Self::Query),
            "path" => Some(Self::Path),
            "header" => Some(Self::Header),
            _ => None,
        }
    }
}

/// Primitive type accepted by a request validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

/// One validation rule for a single named parameter of an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiValidation {
    pub id: i64,
    pub endpoint_id: i64,
    pub param_name: String,
    pub source: ParamSource,
    pub required: bool,
    pub param_type: Option<ParamType>,
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub pattern: Option<String>,
}
