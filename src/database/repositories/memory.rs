//! 内存存储库
//!
//! 与 Postgres 实现保持相同的语义：ID 由存储分配，名称和 slug 唯一，
//! (user_id, segment_id) 唯一，删除用户或分段时级联删除关联。
//! 批量操作先整体校验再写入，所有写操作在同一把写锁下完成，因此失败时不会留下部分结果。
//!
//! 数据不持久化，进程重启后全部丢失，适用于测试和本地开发。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Repository, SegmentRepository, UserRepository, UserSegmentRepository};
use crate::database::models::segment::{SegmentAssignment, SegmentEntity, UserSegmentEntity};
use crate::database::models::user::UserEntity;
use crate::error::{Entity, StorageError, StorageResult};

#[derive(Debug, Default)]
struct Tables {
    next_user_id: i64,
    next_segment_id: i64,
    next_assignment_id: i64,
    users: BTreeMap<i64, UserEntity>,
    segments: BTreeMap<i64, SegmentEntity>,
    /// 键为 (user_id, segment_id)，天然保证唯一
    user_segments: BTreeMap<(i64, i64), UserSegmentEntity>,
}

impl Tables {
    fn segment_id_by_slug(&self, slug: &str) -> Option<i64> {
        self.segments
            .values()
            .find(|segment| segment.slug == slug)
            .map(|segment| segment.id)
    }

    fn ensure_user(&self, user_id: i64) -> StorageResult<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            // 对应数据库的外键约束错误
            Err(StorageError::MissingReference(format!(
                "user {user_id} does not exist"
            )))
        }
    }

    /// 校验一批待添加的关联，返回解析后的 (segment_id, delete_at)
    fn plan_additions(
        &self,
        user_id: i64,
        segments: &[SegmentAssignment],
    ) -> StorageResult<Vec<(i64, Option<DateTime<Utc>>)>> {
        let mut planned: Vec<(i64, Option<DateTime<Utc>>)> = Vec::with_capacity(segments.len());

        for segment in segments {
            let Some(segment_id) = self.segment_id_by_slug(&segment.slug) else {
                tracing::debug!(user_id, slug = %segment.slug, "Skipping unknown segment");
                continue;
            };
            self.ensure_user(user_id)?;
            let duplicate = self.user_segments.contains_key(&(user_id, segment_id))
                || planned.iter().any(|(id, _)| *id == segment_id);
            if duplicate {
                return Err(StorageError::UserAlreadyHasSegment);
            }
            planned.push((segment_id, segment.delete_at));
        }

        Ok(planned)
    }

    fn insert_assignment(
        &mut self,
        user_id: i64,
        segment_id: i64,
        delete_at: Option<DateTime<Utc>>,
    ) {
        self.next_assignment_id += 1;
        self.user_segments.insert(
            (user_id, segment_id),
            UserSegmentEntity {
                id: self.next_assignment_id,
                user_id,
                segment_id,
                delete_at,
            },
        );
    }

    fn remove_assignments_by_slugs(&mut self, user_id: i64, slugs: &[String]) {
        for slug in slugs {
            match self.segment_id_by_slug(slug) {
                Some(segment_id) => {
                    self.user_segments.remove(&(user_id, segment_id));
                }
                None => tracing::debug!(user_id, slug = %slug, "Skipping unknown segment"),
            }
        }
    }

    fn remove_segment(&mut self, segment_id: i64) {
        self.segments.remove(&segment_id);
        self.user_segments
            .retain(|&(_, assigned), _| assigned != segment_id);
    }
}

/// 内存存储库，可克隆并在多个处理器间共享
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回用户的全部关联记录，包括已过期但尚未清理的
    pub async fn assignments_for(&self, user_id: i64) -> Vec<UserSegmentEntity> {
        let tables = self.tables.read().await;
        tables
            .user_segments
            .values()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn save_user(&self, name: &str) -> StorageResult<UserEntity> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|user| user.name == name) {
            return Err(StorageError::AlreadyExists(Entity::User));
        }

        tables.next_user_id += 1;
        let user = UserEntity {
            id: tables.next_user_id,
            name: name.to_string(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> StorageResult<UserEntity> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(Entity::User))
    }

    async fn delete_user(&self, id: i64) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(StorageError::NotExists(Entity::User));
        }
        tables.user_segments.retain(|&(user_id, _), _| user_id != id);
        Ok(())
    }
}

#[async_trait]
impl SegmentRepository for InMemoryRepository {
    async fn save_segment(&self, slug: &str) -> StorageResult<SegmentEntity> {
        let mut tables = self.tables.write().await;
        if tables.segment_id_by_slug(slug).is_some() {
            return Err(StorageError::AlreadyExists(Entity::Segment));
        }

        tables.next_segment_id += 1;
        let segment = SegmentEntity {
            id: tables.next_segment_id,
            slug: slug.to_string(),
        };
        tables.segments.insert(segment.id, segment.clone());
        Ok(segment)
    }

    async fn get_segment(&self, id: i64) -> StorageResult<SegmentEntity> {
        let tables = self.tables.read().await;
        tables
            .segments
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(Entity::Segment))
    }

    async fn get_segment_by_slug(&self, slug: &str) -> StorageResult<SegmentEntity> {
        let tables = self.tables.read().await;
        tables
            .segments
            .values()
            .find(|segment| segment.slug == slug)
            .cloned()
            .ok_or(StorageError::NotFound(Entity::Segment))
    }

    async fn get_segments(&self) -> StorageResult<Vec<SegmentEntity>> {
        let tables = self.tables.read().await;
        Ok(tables.segments.values().cloned().collect())
    }

    async fn delete_segment(&self, id: i64) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.segments.contains_key(&id) {
            return Err(StorageError::NotExists(Entity::Segment));
        }
        tables.remove_segment(id);
        Ok(())
    }

    async fn delete_segment_by_slug(&self, slug: &str) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let Some(id) = tables.segment_id_by_slug(slug) else {
            return Err(StorageError::NotExists(Entity::Segment));
        };
        tables.remove_segment(id);
        Ok(())
    }
}

#[async_trait]
impl UserSegmentRepository for InMemoryRepository {
    async fn add_user_segments(&self, user_id: i64, segment_ids: &[i64]) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        for (index, segment_id) in segment_ids.iter().enumerate() {
            tables.ensure_user(user_id)?;
            if !tables.segments.contains_key(segment_id) {
                return Err(StorageError::MissingReference(format!(
                    "segment {segment_id} does not exist"
                )));
            }
            if tables.user_segments.contains_key(&(user_id, *segment_id))
                || segment_ids[..index].contains(segment_id)
            {
                return Err(StorageError::UserAlreadyHasSegment);
            }
        }
        for &segment_id in segment_ids {
            tables.insert_assignment(user_id, segment_id, None);
        }
        Ok(())
    }

    async fn add_user_segments_by_slugs(
        &self,
        user_id: i64,
        segments: &[SegmentAssignment],
    ) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let planned = tables.plan_additions(user_id, segments)?;
        for (segment_id, delete_at) in planned {
            tables.insert_assignment(user_id, segment_id, delete_at);
        }
        Ok(())
    }

    async fn delete_user_segments_by_slugs(
        &self,
        user_id: i64,
        slugs: &[String],
    ) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables.remove_assignments_by_slugs(user_id, slugs);
        Ok(())
    }

    async fn get_user_segments(&self, user_id: i64) -> StorageResult<Vec<SegmentEntity>> {
        let tables = self.tables.read().await;
        let segments = tables
            .user_segments
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .filter_map(|(&(_, segment_id), _)| tables.segments.get(&segment_id).cloned())
            .collect();
        Ok(segments)
    }

    async fn delete_segments_ttl(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.user_segments.len();
        tables
            .user_segments
            .retain(|_, assignment| !matches!(assignment.delete_at, Some(at) if at < now));
        Ok((before - tables.user_segments.len()) as u64)
    }

    async fn apply_user_segments(
        &self,
        user_id: i64,
        to_add: &[SegmentAssignment],
        to_delete: &[String],
    ) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let planned = tables.plan_additions(user_id, to_add)?;
        for (segment_id, delete_at) in planned {
            tables.insert_assignment(user_id, segment_id, delete_at);
        }
        tables.remove_assignments_by_slugs(user_id, to_delete);
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
