use crate::errors::AppError;
use crate::router::{ExecuteRequest, NodeRouter};
use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Operation router backed by the validation API client.
    pub router: NodeRouter,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/execute
///
/// Runs one node operation over the supplied items and returns the output items.
/// Long-running operations (`job.waitForCompletion`) hold the request open until
/// the job finishes or the wait deadline passes.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - Resource, operation, failure mode and per-item parameters.
///
/// # Returns
///
/// * `Result<Json<serde_json::Value>, AppError>` - `{execution_id, items}` or an error.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let execution_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "execute",
        %execution_id,
        resource = %request.resource,
        operation = %request.operation
    );

    async move {
        tracing::info!(
            "POST /execute - {} item(s), continue_on_fail={}",
            request.items.len(),
            request.continue_on_fail
        );

        let items = state.router.execute(&request).await?;

        tracing::info!("✓ Execution produced {} output item(s)", items.len());
        Ok::<_, AppError>(Json(json!({
            "execution_id": execution_id,
            "items": items,
        })))
    }
    .instrument(span)
    .await
}
