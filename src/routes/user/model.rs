use serde::{Deserialize, Serialize};

use crate::database::models::segment::{SegmentAssignment, SegmentEntity};
use crate::database::models::user::UserEntity;

#[derive(Debug, Deserialize)]
pub struct SaveUserRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub name: String,
}

impl From<UserEntity> for UserResponse {
    fn from(user: UserEntity) -> Self {
        Self {
            user_id: user.id,
            name: user.name,
        }
    }
}

/// 配置用户分段：先添加 `segments_to_add`，再删除 `segments_to_delete`
#[derive(Debug, Deserialize)]
pub struct ConfigureSegmentsRequest {
    #[serde(default)]
    pub segments_to_add: Vec<SegmentAssignment>,
    #[serde(default)]
    pub segments_to_delete: Vec<String>,
}

impl ConfigureSegmentsRequest {
    /// 与保存分段时一致，去掉 slug 两端的空白
    pub fn trimmed(mut self) -> Self {
        for assignment in &mut self.segments_to_add {
            assignment.slug = assignment.slug.trim().to_string();
        }
        for slug in &mut self.segments_to_delete {
            *slug = slug.trim().to_string();
        }
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSegmentsResponse {
    pub segments: Vec<String>,
}

impl From<Vec<SegmentEntity>> for UserSegmentsResponse {
    fn from(segments: Vec<SegmentEntity>) -> Self {
        Self {
            segments: segments.into_iter().map(|segment| segment.slug).collect(),
        }
    }
}
