//! SQLite implementation of the router/validator configuration port (C8/C7).
//!
//! The default route table is seeded once, on an empty `api_endpoints`, so
//! the router never hardcodes the method+path surface — it is config the
//! service happens to ship with, not logic baked into the binary.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ApiEndpoint, ApiValidation, OperationKind, ParamSource, ParamType};
use crate::domain::ports::EndpointRepository;

#[derive(Clone)]
pub struct SqliteEndpointRepository {
    pool: SqlitePool,
}

impl SqliteEndpointRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EndpointRow {
    id: i64,
    method: String,
    path_template: String,
    operation: String,
    load_order: i64,
}

impl TryFrom<EndpointRow> for ApiEndpoint {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: EndpointRow) -> Result<Self, Self::Error> {
        let operation = OperationKind::parse(&row.operation)
            .ok_or_else(|| crate::domain::errors::DomainError::Fatal(format!("unknown stored operation: {}", row.operation)))?;
        Ok(ApiEndpoint { id: row.id, method: row.method, path_template: row.path_template, operation, load_order: row.load_order })
    }
}

#[derive(sqlx::FromRow)]
struct ValidationRow {
    id: i64,
    endpoint_id: i64,
    param_name: String,
    source: String,
    required: bool,
    param_type: Option<String>,
    min_length: Option<i64>,
    max_length: Option<i64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    pattern: Option<String>,
}

impl TryFrom<ValidationRow> for ApiValidation {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: ValidationRow) -> Result<Self, Self::Error> {
        let source = ParamSource::parse(&row.source)
            .ok_or_else(|| crate::domain::errors::DomainError::Fatal(format!("unknown stored source: {}", row.source)))?;
        let param_type = row
            .param_type
            .map(|s| ParamType::parse(&s).ok_or_else(|| crate::domain::errors::DomainError::Fatal(format!("unknown stored param_type: {s}"))))
            .transpose()?;
        Ok(ApiValidation {
            id: row.id,
            endpoint_id: row.endpoint_id,
            param_name: row.param_name,
            source,
            required: row.required,
            param_type,
            min_length: row.min_length,
            max_length: row.max_length,
            minimum: row.minimum,
            maximum: row.maximum,
            pattern: row.pattern,
        })
    }
}

struct SeedValidation {
    param_name: &'static str,
    source: ParamSource,
    required: bool,
    param_type: Option<ParamType>,
    min_length: Option<i64>,
    max_length: Option<i64>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    pattern: Option<&'static str>,
}

impl SeedValidation {
    const fn required(param_name: &'static str, source: ParamSource, param_type: ParamType) -> Self {
        Self {
            param_name,
            source,
            required: true,
            param_type: Some(param_type),
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            pattern: None,
        }
    }

    const fn optional(param_name: &'static str, source: ParamSource, param_type: ParamType) -> Self {
        Self { required: false, ..Self::required(param_name, source, param_type) }
    }

    /// Required but with no type constraint — for fields whose shape is a
    /// per-task-type JSON-Schema document's concern (C2), not a fixed
    /// request-validation rule (C7).
    const fn required_any_type(param_name: &'static str, source: ParamSource) -> Self {
        Self {
            param_name,
            source,
            required: true,
            param_type: None,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            pattern: None,
        }
    }
}

struct SeedEndpoint {
    method: &'static str,
    path_template: &'static str,
    operation: OperationKind,
    validations: &'static [SeedValidation],
}

fn default_endpoints() -> Vec<SeedEndpoint> {
    vec![
        SeedEndpoint { method: "GET", path_template: "/health", operation: OperationKind::Health, validations: &[] },
        SeedEndpoint {
            method: "POST",
            path_template: "/task-types/register",
            operation: OperationKind::RegisterTaskType,
            validations: &[
                SeedValidation::required("name", ParamSource::Body, ParamType::String),
                SeedValidation::required("version", ParamSource::Body, ParamType::String),
                SeedValidation::required("param_schema", ParamSource::Body, ParamType::Object),
            ],
        },
        SeedEndpoint {
            method: "GET",
            path_template: "/task-types/:name",
            operation: OperationKind::GetTaskType,
            validations: &[SeedValidation::required("name", ParamSource::Path, ParamType::String)],
        },
        SeedEndpoint {
            method: "GET",
            path_template: "/task-types",
            operation: OperationKind::ListTaskTypes,
            validations: &[SeedValidation::optional("active_only", ParamSource::Query, ParamType::Boolean)],
        },
        SeedEndpoint {
            method: "POST",
            path_template: "/tasks",
            operation: OperationKind::SubmitTask,
            validations: &[
                SeedValidation::required("type", ParamSource::Body, ParamType::String),
                SeedValidation::required_any_type("params", ParamSource::Body),
                SeedValidation::optional("priority", ParamSource::Body, ParamType::Integer),
            ],
        },
        SeedEndpoint {
            method: "POST",
            path_template: "/tasks/claim",
            operation: OperationKind::ClaimTask,
            validations: &[
                SeedValidation::required("worker_id", ParamSource::Body, ParamType::String),
                SeedValidation::optional("task_type_id", ParamSource::Body, ParamType::Integer),
                SeedValidation::optional("type_pattern", ParamSource::Body, ParamType::String),
                SeedValidation::optional("sort_by", ParamSource::Body, ParamType::String),
                SeedValidation::optional("sort_order", ParamSource::Body, ParamType::String),
            ],
        },
        SeedEndpoint {
            method: "POST",
            path_template: "/tasks/:id/progress",
            operation: OperationKind::UpdateProgress,
            validations: &[
                SeedValidation::required("id", ParamSource::Path, ParamType::Integer),
                SeedValidation::required("worker_id", ParamSource::Body, ParamType::String),
                SeedValidation::required("progress", ParamSource::Body, ParamType::Integer),
            ],
        },
        SeedEndpoint {
            method: "POST",
            path_template: "/tasks/:id/complete",
            operation: OperationKind::CompleteTask,
            validations: &[
                SeedValidation::required("id", ParamSource::Path, ParamType::Integer),
                SeedValidation::required("worker_id", ParamSource::Body, ParamType::String),
                SeedValidation::required("success", ParamSource::Body, ParamType::Boolean),
                SeedValidation::optional("result", ParamSource::Body, ParamType::Object),
                SeedValidation::optional("error", ParamSource::Body, ParamType::String),
            ],
        },
        SeedEndpoint {
            method: "GET",
            path_template: "/tasks/:id",
            operation: OperationKind::GetTask,
            validations: &[SeedValidation::required("id", ParamSource::Path, ParamType::Integer)],
        },
        SeedEndpoint {
            method: "GET",
            path_template: "/tasks",
            operation: OperationKind::ListTasks,
            validations: &[
                SeedValidation::optional("status", ParamSource::Query, ParamType::String),
                SeedValidation::optional("type", ParamSource::Query, ParamType::String),
                SeedValidation::optional("limit", ParamSource::Query, ParamType::Integer),
                SeedValidation::optional("offset", ParamSource::Query, ParamType::Integer),
            ],
        },
    ]
}

fn source_str(source: ParamSource) -> &'static str {
    match source {
        ParamSource::Body => "body",
        ParamSource::Query => "query",
        ParamSource::Path => "path",
        ParamSource::Header => "header",
    }
}

fn param_type_str(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String => "string",
        ParamType::Integer => "integer",
        ParamType::Number => "number",
        ParamType::Boolean => "boolean",
        ParamType::Array => "array",
        ParamType::Object => "object",
    }
}

#[async_trait]
impl EndpointRepository for SqliteEndpointRepository {
    async fn list_endpoints(&self) -> DomainResult<Vec<ApiEndpoint>> {
        let rows: Vec<EndpointRow> = sqlx::query_as("SELECT * FROM api_endpoints ORDER BY load_order ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ApiEndpoint::try_from).collect()
    }

    async fn list_validations(&self, endpoint_id: i64) -> DomainResult<Vec<ApiValidation>> {
        let rows: Vec<ValidationRow> = sqlx::query_as("SELECT * FROM api_validations WHERE endpoint_id = ?")
            .bind(endpoint_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ApiValidation::try_from).collect()
    }

    async fn seed_defaults_if_empty(&self) -> DomainResult<()> {
        let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM api_endpoints").fetch_one(&self.pool).await?;
        if existing.0 > 0 {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(crate::domain::errors::StorageError::from)?;
        for (order, endpoint) in default_endpoints().into_iter().enumerate() {
            let inserted = sqlx::query(
                "INSERT INTO api_endpoints (method, path_template, operation, load_order) VALUES (?, ?, ?, ?)",
            )
            .bind(endpoint.method)
            .bind(endpoint.path_template)
            .bind(endpoint.operation.as_str())
            .bind(order as i64)
            .execute(&mut *tx)
            .await
            .map_err(crate::domain::errors::StorageError::from)?;
            let endpoint_id = inserted.last_insert_rowid();

            for rule in endpoint.validations {
                sqlx::query(
                    r"INSERT INTO api_validations
                        (endpoint_id, param_name, source, required, param_type, min_length, max_length, minimum, maximum, pattern)
                       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(endpoint_id)
                .bind(rule.param_name)
                .bind(source_str(rule.source))
                .bind(rule.required)
                .bind(rule.param_type.map(param_type_str))
                .bind(rule.min_length)
                .bind(rule.max_length)
                .bind(rule.minimum)
                .bind(rule.maximum)
                .bind(rule.pattern)
                .execute(&mut *tx)
                .await
                .map_err(crate::domain::errors::StorageError::from)?;
            }
        }
        tx.commit().await.map_err(crate::domain::errors::StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::create_migrated_test_pool;

    #[tokio::test]
    async fn seed_is_idempotent_and_covers_all_ten_routes() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteEndpointRepository::new(pool);

        repo.seed_defaults_if_empty().await.unwrap();
        repo.seed_defaults_if_empty().await.unwrap();

        let endpoints = repo.list_endpoints().await.unwrap();
        assert_eq!(endpoints.len(), 10);
        assert_eq!(endpoints[0].operation, OperationKind::Health);
    }

    #[tokio::test]
    async fn submit_task_validations_are_loaded() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteEndpointRepository::new(pool);
        repo.seed_defaults_if_empty().await.unwrap();

        let endpoints = repo.list_endpoints().await.unwrap();
        let submit = endpoints.iter().find(|e| e.operation == OperationKind::SubmitTask).unwrap();
        let rules = repo.list_validations(submit.id).await.unwrap();

        assert!(rules.iter().any(|r| r.param_name == "type" && r.required));
        assert!(rules.iter().any(|r| r.param_name == "priority" && !r.required));
    }
}
