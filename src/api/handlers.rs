//! Operation handlers (C5/C4 callers) bound to [`OperationKind`] variants
//! by the router. One function per core operation; the router decides
//! *which* runs, never *how* — that split is what keeps route wiring
//! data-driven while dispatch stays a plain Rust match (spec §9).

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::errors::DomainError;
use crate::domain::models::{ApiValidation, OperationKind, TaskStatus, TaskType};
use crate::domain::ports::TaskFilter;
use crate::services::{claim_policy, request_validator, ClaimRequest, RequestContext};

use super::auth;
use super::envelope;
use super::state::AppState;

/// Entry point bound to every route by [`super::build_router`]. Runs auth,
/// JSON body parsing, per-endpoint request validation, and then the
/// operation itself, in that order — mirroring the submit-path data flow
/// of spec §2 (router → validator → core operation).
pub async fn dispatch(
    operation: OperationKind,
    validations: Arc<Vec<ApiValidation>>,
    State(state): State<AppState>,
    Path(path_params): Path<HashMap<String, String>>,
    Query(query_params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if operation != OperationKind::Health && !auth::verify(&state.api_key, &headers) {
        return envelope::error(DomainError::Unauthorized);
    }

    let body_value: Value = if body.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(_) => return envelope::error(DomainError::BadRequest("request body is not valid JSON".to_string())),
        }
    };

    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string())))
        .collect();

    let ctx = RequestContext { path_params, query_params, headers: header_map, body: body_value };

    if let Err(violations) = request_validator::validate(&validations, &ctx) {
        return envelope::error(DomainError::Validation(violations));
    }

    match operation {
        OperationKind::Health => envelope::success(json!({ "status": "ok" })),
        OperationKind::RegisterTaskType => register_task_type(&state, &ctx).await,
        OperationKind::GetTaskType => get_task_type(&state, &ctx).await,
        OperationKind::ListTaskTypes => list_task_types(&state, &ctx).await,
        OperationKind::SubmitTask => submit_task(&state, &ctx).await,
        OperationKind::ClaimTask => claim_task(&state, &ctx).await,
        OperationKind::UpdateProgress => update_progress(&state, &ctx).await,
        OperationKind::CompleteTask => complete_task(&state, &ctx).await,
        OperationKind::GetTask => get_task(&state, &ctx).await,
        OperationKind::ListTasks => list_tasks(&state, &ctx).await,
    }
}

async fn register_task_type(state: &AppState, ctx: &RequestContext) -> Response {
    let name = ctx.body.get("name").and_then(Value::as_str).unwrap_or_default();
    let version = ctx.body.get("version").and_then(Value::as_str).unwrap_or_default();
    let schema = ctx.body.get("param_schema").cloned().unwrap_or(Value::Null);

    match state.registry.register(name, version, schema).await {
        Ok(task_type) => envelope::success_with(StatusCode::CREATED, task_type_json(&task_type), None),
        Err(err) => envelope::error(err),
    }
}

async fn get_task_type(state: &AppState, ctx: &RequestContext) -> Response {
    let Some(name) = ctx.path_params.get("name") else {
        return envelope::error(DomainError::BadRequest("missing path parameter: name".to_string()));
    };
    match state.registry.get(name).await {
        Ok(task_type) => envelope::success(task_type_json(&task_type)),
        Err(err) => envelope::error(err),
    }
}

async fn list_task_types(state: &AppState, ctx: &RequestContext) -> Response {
    let active_only = ctx.query_params.get("active_only").is_some_and(|v| v == "true" || v == "1");
    match state.registry.list(active_only).await {
        Ok(usages) => {
            let items: Vec<Value> = usages.iter().map(usage_json).collect();
            envelope::success(Value::Array(items))
        }
        Err(err) => envelope::error(err),
    }
}

async fn submit_task(state: &AppState, ctx: &RequestContext) -> Response {
    let type_name = ctx.body.get("type").and_then(Value::as_str).unwrap_or_default();
    let params = ctx.body.get("params").cloned().unwrap_or(json!({}));
    let priority = ctx.body.get("priority").and_then(Value::as_i64).unwrap_or(0);

    match state.engine.submit(type_name, params, priority).await {
        Ok(outcome) => {
            let status = if outcome.deduplicated { StatusCode::OK } else { StatusCode::CREATED };
            let mut data = task_json(&outcome.task);
            data["deduplicated"] = json!(outcome.deduplicated);
            envelope::success_with(status, data, None)
        }
        Err(err) => envelope::error(err),
    }
}

async fn claim_task(state: &AppState, ctx: &RequestContext) -> Response {
    let Some(worker_id) = ctx.body.get("worker_id").and_then(Value::as_str) else {
        return envelope::error(DomainError::BadRequest("worker_id is required".to_string()));
    };

    let claim_request = ClaimRequest {
        task_type_id: ctx.body.get("task_type_id").and_then(Value::as_i64),
        type_pattern: ctx.body.get("type_pattern").and_then(Value::as_str).map(str::to_string),
        sort_by: ctx.body.get("sort_by").and_then(Value::as_str).map(str::to_string),
        sort_order: ctx.body.get("sort_order").and_then(Value::as_str).map(str::to_string),
    };

    let policy = match claim_policy::compose(&claim_request) {
        Ok(policy) => policy,
        Err(err) => return envelope::error(err),
    };

    match state.engine.claim(worker_id, &policy).await {
        Ok(Some(task)) => envelope::success(task_json(&task)),
        Ok(None) => envelope::success(Value::Null),
        Err(err) => envelope::error(err),
    }
}

async fn update_progress(state: &AppState, ctx: &RequestContext) -> Response {
    let Some(task_id) = path_id(ctx) else {
        return envelope::error(DomainError::BadRequest("invalid task id".to_string()));
    };
    let Some(worker_id) = ctx.body.get("worker_id").and_then(Value::as_str) else {
        return envelope::error(DomainError::BadRequest("worker_id is required".to_string()));
    };
    let Some(progress) = ctx.body.get("progress").and_then(Value::as_i64) else {
        return envelope::error(DomainError::BadRequest("progress is required".to_string()));
    };

    match state.engine.update_progress(task_id, worker_id, progress as i32).await {
        Ok(()) => envelope::success(json!({ "task_id": task_id, "progress": progress })),
        Err(err) => envelope::error(err),
    }
}

async fn complete_task(state: &AppState, ctx: &RequestContext) -> Response {
    let Some(task_id) = path_id(ctx) else {
        return envelope::error(DomainError::BadRequest("invalid task id".to_string()));
    };
    let Some(worker_id) = ctx.body.get("worker_id").and_then(Value::as_str) else {
        return envelope::error(DomainError::BadRequest("worker_id is required".to_string()));
    };
    let Some(success) = ctx.body.get("success").and_then(Value::as_bool) else {
        return envelope::error(DomainError::BadRequest("success is required".to_string()));
    };
    let result = ctx.body.get("result").cloned();
    let error = ctx.body.get("error").and_then(Value::as_str).map(str::to_string);

    match state.engine.complete(task_id, worker_id, success, result, error).await {
        Ok(outcome) => envelope::success(json!({ "task_id": task_id, "status": complete_outcome_str(outcome) })),
        Err(err) => envelope::error(err),
    }
}

async fn get_task(state: &AppState, ctx: &RequestContext) -> Response {
    let Some(task_id) = path_id(ctx) else {
        return envelope::error(DomainError::BadRequest("invalid task id".to_string()));
    };
    match state.engine.get(task_id).await {
        Ok(task) => envelope::success(task_json(&task)),
        Err(err) => envelope::error(err),
    }
}

async fn list_tasks(state: &AppState, ctx: &RequestContext) -> Response {
    let status = match ctx.query_params.get("status") {
        Some(s) => match TaskStatus::from_str(s) {
            Some(status) => Some(status),
            None => return envelope::error(DomainError::BadRequest(format!("status: {s}"))),
        },
        None => None,
    };

    let type_id = match ctx.query_params.get("type") {
        Some(name) => match state.registry.get(name).await {
            Ok(task_type) => Some(task_type.id),
            Err(err) => return envelope::error(err),
        },
        None => None,
    };

    let limit = ctx.query_params.get("limit").and_then(|v| v.parse::<i64>().ok()).unwrap_or(50);
    let offset = ctx.query_params.get("offset").and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);

    match state.engine.list(TaskFilter { status, type_id, limit, offset }).await {
        Ok(tasks) => envelope::success(Value::Array(tasks.iter().map(task_json).collect())),
        Err(err) => envelope::error(err),
    }
}

fn path_id(ctx: &RequestContext) -> Option<i64> {
    ctx.path_params.get("id")?.parse::<i64>().ok()
}

fn complete_outcome_str(outcome: crate::services::CompleteOutcome) -> &'static str {
    use crate::services::CompleteOutcome;
    match outcome {
        CompleteOutcome::Completed => "completed",
        CompleteOutcome::Requeued => "pending",
        CompleteOutcome::Failed => "failed",
    }
}

fn task_json(task: &crate::domain::models::Task) -> Value {
    serde_json::to_value(task).unwrap_or(Value::Null)
}

fn task_type_json(task_type: &TaskType) -> Value {
    serde_json::to_value(task_type).unwrap_or(Value::Null)
}

#[derive(Serialize)]
struct TaskTypeUsageJson<'a> {
    #[serde(flatten)]
    task_type: &'a TaskType,
    task_count: i64,
    last_used_at: Option<DateTime<Utc>>,
}

fn usage_json(usage: &crate::domain::ports::TaskTypeUsage) -> Value {
    serde_json::to_value(TaskTypeUsageJson {
        task_type: &usage.task_type,
        task_count: usage.task_count,
        last_used_at: usage.last_used_at,
    })
    .unwrap_or(Value::Null)
}
