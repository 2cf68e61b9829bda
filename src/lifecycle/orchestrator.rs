use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::database::models::segment::{SegmentAssignment, SegmentEntity};
use crate::database::repositories::UserSegmentRepository;
use crate::error::StorageResult;

/// 用户分段编排器
///
/// 只依赖 [`UserSegmentRepository`]，测试时可以换成任意替身实现。
pub struct SegmentLifecycle<R: ?Sized> {
    repo: Arc<R>,
}

impl<R: ?Sized> Clone for SegmentLifecycle<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R> SegmentLifecycle<R>
where
    R: UserSegmentRepository + ?Sized,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// 先添加后删除。添加失败时直接返回错误，不再执行删除
    pub async fn configure_user_segments(
        &self,
        user_id: i64,
        to_add: &[SegmentAssignment],
        to_delete: &[String],
    ) -> StorageResult<()> {
        tracing::debug!(
            user_id,
            to_add = to_add.len(),
            to_delete = to_delete.len(),
            "Configuring user segments"
        );

        match self.repo.apply_user_segments(user_id, to_add, to_delete).await {
            Ok(()) => {
                tracing::info!(user_id, "User segments updated");
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to configure user segments");
                Err(e)
            }
        }
    }

    /// 删除 delete_at 早于 `now` 的关联，返回删除数量
    pub async fn expire_assignments(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let expired = self.repo.delete_segments_ttl(now).await?;
        if expired > 0 {
            tracing::info!(expired, %now, "Expired user segments removed");
        } else {
            tracing::debug!(%now, "No expired user segments");
        }
        Ok(expired)
    }

    pub async fn get_user_segments(&self, user_id: i64) -> StorageResult<Vec<SegmentEntity>> {
        self.repo.get_user_segments(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::{InMemoryRepository, SegmentRepository, UserRepository};
    use crate::error::StorageError;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    fn slugs(segments: &[SegmentEntity]) -> Vec<String> {
        let mut slugs: Vec<String> = segments.iter().map(|s| s.slug.clone()).collect();
        slugs.sort();
        slugs
    }

    #[tokio::test]
    async fn alice_scenario() {
        let repo = Arc::new(InMemoryRepository::new());
        let alice = repo.save_user("alice").await.expect("alice");
        repo.save_segment("beta").await.expect("beta");
        repo.save_segment("promo").await.expect("promo");
        let lifecycle = SegmentLifecycle::new(Arc::clone(&repo));

        let now = Utc::now();
        lifecycle
            .configure_user_segments(
                alice.id,
                &[
                    SegmentAssignment::permanent("beta"),
                    SegmentAssignment::expiring("promo", now + Duration::hours(1)),
                ],
                &[],
            )
            .await
            .expect("configure");

        let segments = lifecycle.get_user_segments(alice.id).await.expect("segments");
        assert_eq!(slugs(&segments), vec!["beta", "promo"]);

        let later = now + Duration::hours(1) + Duration::seconds(1);
        assert_eq!(lifecycle.expire_assignments(later).await.expect("sweep"), 1);
        let segments = lifecycle.get_user_segments(alice.id).await.expect("segments");
        assert_eq!(slugs(&segments), vec!["beta"]);

        assert_eq!(lifecycle.expire_assignments(later).await.expect("sweep"), 0);
    }

    #[tokio::test]
    async fn configure_adds_then_deletes() {
        let repo = Arc::new(InMemoryRepository::new());
        let user = repo.save_user("bob").await.expect("bob");
        for slug in ["a", "b", "c"] {
            repo.save_segment(slug).await.expect("segment");
        }
        let lifecycle = SegmentLifecycle::new(Arc::clone(&repo));

        lifecycle
            .configure_user_segments(
                user.id,
                &[SegmentAssignment::permanent("a"), SegmentAssignment::permanent("b")],
                &[],
            )
            .await
            .expect("first");
        lifecycle
            .configure_user_segments(
                user.id,
                &[SegmentAssignment::permanent("c")],
                &["a".to_string(), "unknown".to_string()],
            )
            .await
            .expect("second");

        let segments = lifecycle.get_user_segments(user.id).await.expect("segments");
        assert_eq!(slugs(&segments), vec!["b", "c"]);
    }

    /// 记录调用顺序，并可让添加阶段失败
    #[derive(Default)]
    struct RecordingRepository {
        fail_add: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingRepository {
        fn record(&self, call: &'static str) {
            self.calls.lock().expect("calls").push(call);
        }
    }

    #[async_trait]
    impl UserSegmentRepository for RecordingRepository {
        async fn add_user_segments(&self, _: i64, _: &[i64]) -> StorageResult<()> {
            self.record("add_ids");
            Ok(())
        }

        async fn add_user_segments_by_slugs(
            &self,
            _: i64,
            _: &[SegmentAssignment],
        ) -> StorageResult<()> {
            self.record("add");
            if self.fail_add {
                return Err(StorageError::UserAlreadyHasSegment);
            }
            Ok(())
        }

        async fn delete_user_segments_by_slugs(&self, _: i64, _: &[String]) -> StorageResult<()> {
            self.record("delete");
            Ok(())
        }

        async fn get_user_segments(&self, _: i64) -> StorageResult<Vec<SegmentEntity>> {
            Ok(Vec::new())
        }

        async fn delete_segments_ttl(&self, _: DateTime<Utc>) -> StorageResult<u64> {
            self.record("ttl");
            Err(StorageError::Failure(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn failed_add_skips_delete() {
        let repo = Arc::new(RecordingRepository {
            fail_add: true,
            ..Default::default()
        });
        let lifecycle = SegmentLifecycle::new(Arc::clone(&repo));

        let err = lifecycle
            .configure_user_segments(1, &[SegmentAssignment::permanent("a")], &["b".to_string()])
            .await
            .expect_err("add fails");
        assert!(matches!(err, StorageError::UserAlreadyHasSegment));
        assert_eq!(*repo.calls.lock().expect("calls"), vec!["add"]);
    }

    #[tokio::test]
    async fn successful_add_runs_delete() {
        let repo = Arc::new(RecordingRepository::default());
        let lifecycle = SegmentLifecycle::new(Arc::clone(&repo));

        lifecycle
            .configure_user_segments(1, &[], &["b".to_string()])
            .await
            .expect("configure");
        assert_eq!(*repo.calls.lock().expect("calls"), vec!["add", "delete"]);
    }

    #[tokio::test]
    async fn sweep_failure_is_surfaced() {
        let repo = Arc::new(RecordingRepository::default());
        let lifecycle = SegmentLifecycle::new(repo);

        let err = lifecycle
            .expire_assignments(Utc::now())
            .await
            .expect_err("store down");
        assert!(matches!(err, StorageError::Failure(_)));
    }
}
