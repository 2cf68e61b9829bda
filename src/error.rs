use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{ApiResponse, error_codes};

/// 存储层实体类型，用于区分错误来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Segment,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::User => f.write_str("user"),
            Entity::Segment => f.write_str("segment"),
        }
    }
}

/// 存储层错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 创建时违反唯一约束
    #[error("{0} already exists")]
    AlreadyExists(Entity),
    /// 查询未命中
    #[error("{0} not found")]
    NotFound(Entity),
    /// 删除时没有影响任何行
    #[error("{0} not exists")]
    NotExists(Entity),
    #[error("user already has segment")]
    UserAlreadyHasSegment,
    /// 关联引用了不存在的用户或分段（外键约束）
    #[error("missing reference: {0}")]
    MissingReference(String),
    /// 其他数据库错误，包括连接失败
    #[error("storage failure: {0}")]
    Failure(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub fn status(&self) -> StatusCode {
        match self {
            StorageError::AlreadyExists(_) | StorageError::UserAlreadyHasSegment => {
                StatusCode::CONFLICT
            }
            StorageError::NotFound(_) | StorageError::NotExists(_) => StatusCode::NOT_FOUND,
            StorageError::MissingReference(_) | StorageError::Failure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 是否属于服务端故障，对外隐藏细节
    pub fn is_internal(&self) -> bool {
        matches!(self, StorageError::MissingReference(_) | StorageError::Failure(_))
    }

    pub fn code(&self) -> i32 {
        match self {
            StorageError::AlreadyExists(Entity::User) => error_codes::USER_EXISTS,
            StorageError::AlreadyExists(Entity::Segment) => error_codes::SEGMENT_EXISTS,
            StorageError::NotFound(_) | StorageError::NotExists(_) => error_codes::NOT_FOUND,
            StorageError::UserAlreadyHasSegment => error_codes::USER_ALREADY_HAS_SEGMENT,
            StorageError::MissingReference(_) | StorageError::Failure(_) => {
                error_codes::INTERNAL_ERROR
            }
        }
    }
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// 接口层错误，统一转换为 `ApiResponse`
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Storage(StorageError),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR, msg),
            AppError::Storage(err) => {
                // 不向客户端暴露数据库细节
                let msg = if err.is_internal() {
                    "内部服务器错误".to_string()
                } else {
                    err.to_string()
                };
                (err.status(), err.code(), msg)
            }
        };

        let body = Json(ApiResponse::<()> {
            code,
            msg,
            resp_data: None,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reference_is_internal() {
        let err = StorageError::MissingReference("user 7 does not exist".into());
        assert!(err.is_internal());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), error_codes::INTERNAL_ERROR);
        assert_eq!(err.to_string(), "missing reference: user 7 does not exist");
    }

    #[test]
    fn conflicts_are_not_internal() {
        let err = StorageError::UserAlreadyHasSegment;
        assert!(!err.is_internal());
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
