use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::AppError,
    utils::{ApiResponse, success_to_api_response},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
}

pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<HealthResponse>>, AppError> {
    state
        .repo
        .health_check()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Health check failed"))?;

    Ok(success_to_api_response(HealthResponse {
        status: "ok".into(),
        backend: state.repo.backend_name().into(),
    }))
}
