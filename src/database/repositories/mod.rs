// 存储库接口
// 处理器和编排层只依赖这里的能力接口，具体实现可以替换

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::models::segment::{SegmentAssignment, SegmentEntity};
use crate::database::models::user::UserEntity;
use crate::error::StorageResult;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

/// 用户的增删查
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 名称重复时返回 `AlreadyExists`
    async fn save_user(&self, name: &str) -> StorageResult<UserEntity>;
    async fn get_user(&self, id: i64) -> StorageResult<UserEntity>;
    /// 删除用户，关联的分段由外键级联删除
    async fn delete_user(&self, id: i64) -> StorageResult<()>;
}

/// 分段的增删查
#[async_trait]
pub trait SegmentRepository: Send + Sync {
    async fn save_segment(&self, slug: &str) -> StorageResult<SegmentEntity>;
    async fn get_segment(&self, id: i64) -> StorageResult<SegmentEntity>;
    async fn get_segment_by_slug(&self, slug: &str) -> StorageResult<SegmentEntity>;
    /// 返回顺序不作保证
    async fn get_segments(&self) -> StorageResult<Vec<SegmentEntity>>;
    async fn delete_segment(&self, id: i64) -> StorageResult<()>;
    async fn delete_segment_by_slug(&self, slug: &str) -> StorageResult<()>;
}

/// 用户与分段的关联
#[async_trait]
pub trait UserSegmentRepository: Send + Sync {
    /// 按分段ID添加，不设置过期时间
    async fn add_user_segments(&self, user_id: i64, segment_ids: &[i64]) -> StorageResult<()>;

    /// 按 slug 添加，不存在的 slug 直接跳过
    async fn add_user_segments_by_slugs(
        &self,
        user_id: i64,
        segments: &[SegmentAssignment],
    ) -> StorageResult<()>;

    /// 按 slug 删除，不存在的 slug 或关联直接跳过
    async fn delete_user_segments_by_slugs(&self, user_id: i64, slugs: &[String])
    -> StorageResult<()>;

    async fn get_user_segments(&self, user_id: i64) -> StorageResult<Vec<SegmentEntity>>;

    /// 删除 delete_at 早于 `now` 的关联，返回删除的行数
    async fn delete_segments_ttl(&self, now: DateTime<Utc>) -> StorageResult<u64>;

    /// 先添加后删除；添加失败时不执行删除
    async fn apply_user_segments(
        &self,
        user_id: i64,
        to_add: &[SegmentAssignment],
        to_delete: &[String],
    ) -> StorageResult<()> {
        self.add_user_segments_by_slugs(user_id, to_add).await?;
        self.delete_user_segments_by_slugs(user_id, to_delete).await
    }
}

/// 完整的存储后端
#[async_trait]
pub trait Repository: UserRepository + SegmentRepository + UserSegmentRepository {
    async fn health_check(&self) -> StorageResult<()>;
    fn backend_name(&self) -> &'static str;
}
