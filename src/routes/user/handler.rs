use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    error::{AppError, StorageError},
    utils::{ApiResponse, EmptyResponse, success_to_api_response},
};

use super::model::{ConfigureSegmentsRequest, SaveUserRequest, UserResponse, UserSegmentsResponse};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub async fn save_user(
    State(state): State<AppState>,
    Json(req): Json<SaveUserRequest>,
) -> ApiResult<UserResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("用户名不能为空".to_string()));
    }

    match state.repo.save_user(name).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, "User created");
            Ok(success_to_api_response(user.into()))
        }
        Err(e @ StorageError::AlreadyExists(_)) => {
            tracing::info!(name, "User already exists");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create user");
            Err(e.into())
        }
    }
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<UserResponse> {
    let user = state.repo.get_user(user_id).await.inspect_err(|e| {
        if e.is_internal() {
            tracing::error!(user_id, error = %e, "Failed to get user");
        }
    })?;

    Ok(success_to_api_response(user.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<EmptyResponse> {
    match state.repo.delete_user(user_id).await {
        Ok(()) => {
            tracing::info!(user_id, "User deleted");
            Ok(success_to_api_response(EmptyResponse {}))
        }
        Err(e @ StorageError::NotExists(_)) => {
            tracing::info!(user_id, "User does not exist");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(user_id, error = %e, "Failed to delete user");
            Err(e.into())
        }
    }
}

pub async fn get_user_segments(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<UserSegmentsResponse> {
    let segments = state
        .lifecycle
        .get_user_segments(user_id)
        .await
        .inspect_err(|e| tracing::error!(user_id, error = %e, "Failed to get user segments"))?;

    tracing::debug!(user_id, count = segments.len(), "User segments retrieved");
    Ok(success_to_api_response(segments.into()))
}

pub async fn configure_segments(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<ConfigureSegmentsRequest>,
) -> ApiResult<EmptyResponse> {
    let req = req.trimmed();
    state
        .lifecycle
        .configure_user_segments(user_id, &req.segments_to_add, &req.segments_to_delete)
        .await?;

    Ok(success_to_api_response(EmptyResponse {}))
}
