use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 分段数据库实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SegmentEntity {
    pub id: i64,
    pub slug: String,
}

/// 用户分段关联实体，对应 user_segments 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserSegmentEntity {
    pub id: i64,
    pub user_id: i64,
    pub segment_id: i64,
    /// 为空表示不会被自动清理
    pub delete_at: Option<DateTime<Utc>>,
}

/// 按 slug 为用户添加分段时的单项参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentAssignment {
    pub slug: String,
    #[serde(default)]
    pub delete_at: Option<DateTime<Utc>>,
}

impl SegmentAssignment {
    pub fn permanent(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            delete_at: None,
        }
    }

    pub fn expiring(slug: impl Into<String>, delete_at: DateTime<Utc>) -> Self {
        Self {
            slug: slug.into(),
            delete_at: Some(delete_at),
        }
    }
}
