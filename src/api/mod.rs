//! HTTP/JSON surface (C8 Endpoint Router): loads its route table from
//! storage at startup and dispatches each request to the bound
//! [`OperationKind`](crate::domain::models::OperationKind) handler. The
//! CORS/rate-limit/auth middleware chain spec.md treats as an external
//! collaborator is represented here by a small `tower`/`tower_http` layer
//! stack (body-size cap, CORS, request tracing); the `X-API-Key` check
//! itself lives in [`auth`] since spec §6 pins it to this service.

pub mod auth;
pub mod envelope;
pub mod handlers;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post, put, MethodRouter};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::domain::errors::DomainError;
use crate::domain::models::ApiEndpoint;
use crate::domain::ports::EndpointRepository;

pub use state::AppState;

/// Build the full `axum::Router`, seeding the default route table on an
/// empty `api_endpoints` and loading every endpoint's validation rules
/// once at startup (spec §4.8: the router is stateless between requests,
/// but its configuration is read once, not per-request).
pub async fn build_router(
    endpoints: Arc<dyn EndpointRepository>,
    state: AppState,
    max_request_size: usize,
) -> Result<Router, DomainError> {
    endpoints.seed_defaults_if_empty().await?;
    let routes = endpoints.list_endpoints().await?;

    let mut router = Router::new();
    for endpoint in routes {
        let validations = Arc::new(endpoints.list_validations(endpoint.id).await?);
        router = router.route(&axum_path(&endpoint.path_template), route_for(&endpoint, validations));
    }

    Ok(router
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()))
}

fn route_for(endpoint: &ApiEndpoint, validations: Arc<Vec<crate::domain::models::ApiValidation>>) -> MethodRouter<AppState> {
    let operation = endpoint.operation;
    let handler = move |State(state): State<AppState>,
                         Path(path_params): Path<HashMap<String, String>>,
                         Query(query_params): Query<HashMap<String, String>>,
                         headers: HeaderMap,
                         body: axum::body::Bytes| {
        let validations = validations.clone();
        async move {
            handlers::dispatch(operation, validations, State(state), Path(path_params), Query(query_params), headers, body).await
        }
    };

    match endpoint.method.as_str() {
        "GET" => get(handler),
        "POST" => post(handler),
        "PUT" => put(handler),
        "DELETE" => delete(handler),
        other => {
            tracing::warn!(method = other, "unrecognized HTTP method in api_endpoints, defaulting to GET");
            get(handler)
        }
    }
}

/// `:name` path segments (as stored in `api_endpoints.path_template`) use
/// axum 0.8's `{name}` capture syntax on the wire.
fn axum_path(template: &str) -> String {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_template_translates_colon_params() {
        assert_eq!(axum_path("/tasks/:id/progress"), "/tasks/{id}/progress");
        assert_eq!(axum_path("/task-types/:name"), "/task-types/{name}");
        assert_eq!(axum_path("/health"), "/health");
    }
}
