// Postgres 存储库
// 批量操作在同一个事务中执行，中途失败不会留下部分结果

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgConnection, PgPool};

use super::{Repository, SegmentRepository, UserRepository, UserSegmentRepository};
use crate::config::Config;
use crate::database::models::segment::{SegmentAssignment, SegmentEntity};
use crate::database::models::user::UserEntity;
use crate::error::{Entity, StorageError, StorageResult};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// 基于连接池的存储库，连接池由调用方注入
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按配置建立连接池
    pub async fn connect(database_url: &str, config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout())
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'segments';").await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// 执行 migrations 目录下的建表脚本
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err
            .code()
            .map(|code| code == UNIQUE_VIOLATION)
            .unwrap_or(false);
    }
    false
}

/// 唯一约束冲突转换为指定错误，外键冲突转换为 `MissingReference`
fn conflict_or_failure(err: sqlx::Error, conflict: StorageError) -> StorageError {
    if is_unique_violation(&err) {
        return conflict;
    }
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return StorageError::MissingReference(db_err.message().to_string());
        }
    }
    StorageError::Failure(err)
}

async fn find_segment_id(conn: &mut PgConnection, slug: &str) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM segments WHERE slug = $1")
        .bind(slug)
        .fetch_optional(conn)
        .await
}

async fn insert_assignment(
    conn: &mut PgConnection,
    user_id: i64,
    segment_id: i64,
    delete_at: Option<DateTime<Utc>>,
) -> StorageResult<()> {
    sqlx::query("INSERT INTO user_segments (user_id, segment_id, delete_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(segment_id)
        .bind(delete_at)
        .execute(conn)
        .await
        .map_err(|err| conflict_or_failure(err, StorageError::UserAlreadyHasSegment))?;

    Ok(())
}

async fn insert_assignments_by_slugs(
    conn: &mut PgConnection,
    user_id: i64,
    segments: &[SegmentAssignment],
) -> StorageResult<()> {
    for segment in segments {
        let Some(segment_id) = find_segment_id(&mut *conn, &segment.slug).await? else {
            tracing::debug!(user_id, slug = %segment.slug, "Skipping unknown segment");
            continue;
        };
        insert_assignment(&mut *conn, user_id, segment_id, segment.delete_at).await?;
    }

    Ok(())
}

async fn remove_assignments_by_slugs(
    conn: &mut PgConnection,
    user_id: i64,
    slugs: &[String],
) -> StorageResult<()> {
    for slug in slugs {
        let Some(segment_id) = find_segment_id(&mut *conn, slug).await? else {
            tracing::debug!(user_id, slug = %slug, "Skipping unknown segment");
            continue;
        };
        sqlx::query("DELETE FROM user_segments WHERE user_id = $1 AND segment_id = $2")
            .bind(user_id)
            .bind(segment_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn save_user(&self, name: &str) -> StorageResult<UserEntity> {
        sqlx::query_as::<_, UserEntity>("INSERT INTO users (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| conflict_or_failure(err, StorageError::AlreadyExists(Entity::User)))
    }

    async fn get_user(&self, id: i64) -> StorageResult<UserEntity> {
        sqlx::query_as::<_, UserEntity>("SELECT id, name FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound(Entity::User))
    }

    async fn delete_user(&self, id: i64) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotExists(Entity::User));
        }
        Ok(())
    }
}

#[async_trait]
impl SegmentRepository for PgRepository {
    async fn save_segment(&self, slug: &str) -> StorageResult<SegmentEntity> {
        sqlx::query_as::<_, SegmentEntity>(
            "INSERT INTO segments (slug) VALUES ($1) RETURNING id, slug",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| conflict_or_failure(err, StorageError::AlreadyExists(Entity::Segment)))
    }

    async fn get_segment(&self, id: i64) -> StorageResult<SegmentEntity> {
        sqlx::query_as::<_, SegmentEntity>("SELECT id, slug FROM segments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound(Entity::Segment))
    }

    async fn get_segment_by_slug(&self, slug: &str) -> StorageResult<SegmentEntity> {
        sqlx::query_as::<_, SegmentEntity>("SELECT id, slug FROM segments WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound(Entity::Segment))
    }

    async fn get_segments(&self) -> StorageResult<Vec<SegmentEntity>> {
        let segments = sqlx::query_as::<_, SegmentEntity>("SELECT id, slug FROM segments")
            .fetch_all(&self.pool)
            .await?;

        Ok(segments)
    }

    async fn delete_segment(&self, id: i64) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM segments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotExists(Entity::Segment));
        }
        Ok(())
    }

    async fn delete_segment_by_slug(&self, slug: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM segments WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotExists(Entity::Segment));
        }
        Ok(())
    }
}

#[async_trait]
impl UserSegmentRepository for PgRepository {
    async fn add_user_segments(&self, user_id: i64, segment_ids: &[i64]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        for &segment_id in segment_ids {
            insert_assignment(&mut *tx, user_id, segment_id, None).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn add_user_segments_by_slugs(
        &self,
        user_id: i64,
        segments: &[SegmentAssignment],
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_assignments_by_slugs(&mut *tx, user_id, segments).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn delete_user_segments_by_slugs(
        &self,
        user_id: i64,
        slugs: &[String],
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        remove_assignments_by_slugs(&mut *tx, user_id, slugs).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn get_user_segments(&self, user_id: i64) -> StorageResult<Vec<SegmentEntity>> {
        let segments = sqlx::query_as::<_, SegmentEntity>(
            r#"
            SELECT s.id, s.slug
            FROM user_segments AS us
            JOIN segments AS s ON us.segment_id = s.id
            WHERE us.user_id = $1
            ORDER BY s.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(segments)
    }

    async fn delete_segments_ttl(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query(
            "DELETE FROM user_segments WHERE delete_at IS NOT NULL AND delete_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn apply_user_segments(
        &self,
        user_id: i64,
        to_add: &[SegmentAssignment],
        to_delete: &[String],
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_assignments_by_slugs(&mut *tx, user_id, to_add).await?;
        remove_assignments_by_slugs(&mut *tx, user_id, to_delete).await?;
        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
