use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;

use crate::{
    AppState,
    error::{AppError, StorageError},
    utils::{ApiResponse, EmptyResponse, success_to_api_response},
};

use super::model::{ExpireResponse, SaveSegmentRequest, SegmentResponse, SegmentsResponse};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub async fn save_segment(
    State(state): State<AppState>,
    Json(req): Json<SaveSegmentRequest>,
) -> ApiResult<SegmentResponse> {
    let slug = req.slug.trim();
    if slug.is_empty() {
        return Err(AppError::Validation("分段名称不能为空".to_string()));
    }

    match state.repo.save_segment(slug).await {
        Ok(segment) => {
            tracing::info!(segment_id = segment.id, slug, "Segment created");
            Ok(success_to_api_response(segment.into()))
        }
        Err(e @ StorageError::AlreadyExists(_)) => {
            tracing::info!(slug, "Segment already exists");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create segment");
            Err(e.into())
        }
    }
}

pub async fn get_segments(State(state): State<AppState>) -> ApiResult<SegmentsResponse> {
    let segments = state
        .repo
        .get_segments()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Failed to get segments"))?;

    Ok(success_to_api_response(SegmentsResponse {
        segments: segments.into_iter().map(|segment| segment.slug).collect(),
    }))
}

pub async fn get_segment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<SegmentResponse> {
    let segment = state.repo.get_segment_by_slug(&slug).await.inspect_err(|e| {
        if e.is_internal() {
            tracing::error!(slug = %slug, error = %e, "Failed to get segment");
        }
    })?;

    Ok(success_to_api_response(segment.into()))
}

pub async fn delete_segment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<EmptyResponse> {
    match state.repo.delete_segment_by_slug(&slug).await {
        Ok(()) => {
            tracing::info!(slug = %slug, "Segment deleted");
            Ok(success_to_api_response(EmptyResponse {}))
        }
        Err(e @ StorageError::NotExists(_)) => {
            tracing::info!(slug = %slug, "Segment does not exist");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(slug = %slug, error = %e, "Failed to delete segment");
            Err(e.into())
        }
    }
}

/// 手动触发一次过期清理
pub async fn expire_segments(State(state): State<AppState>) -> ApiResult<ExpireResponse> {
    let expired = state.lifecycle.expire_assignments(Utc::now()).await?;
    Ok(success_to_api_response(ExpireResponse { expired }))
}
