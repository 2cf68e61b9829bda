use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use super::SegmentLifecycle;
use crate::database::repositories::UserSegmentRepository;
use crate::error::StorageResult;

/// 定时清理过期分段
///
/// 清理是幂等的，重复或重叠执行都是安全的。
pub struct ExpirySweeper<R: ?Sized> {
    lifecycle: SegmentLifecycle<R>,
    period: Duration,
    running: Arc<RwLock<bool>>,
}

impl<R> ExpirySweeper<R>
where
    R: UserSegmentRepository + ?Sized + 'static,
{
    pub fn new(lifecycle: SegmentLifecycle<R>, period: Duration) -> Self {
        Self {
            lifecycle,
            period,
            // 创建即视为运行中，在 start 之前调用 stop 也能生效
            running: Arc::new(RwLock::new(true)),
        }
    }

    /// 持续运行直到调用 [`ExpirySweeper::stop`]
    pub async fn start(&self) {
        info!(period_secs = self.period.as_secs(), "Starting expiry sweeper");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !*self.running.read().await {
                break;
            }

            // 失败已在 run_once 中记录，等待下一个周期
            self.run_once().await.ok();
        }

        info!("Expiry sweeper stopped");
    }

    /// 立即执行一次清理
    pub async fn run_once(&self) -> StorageResult<u64> {
        let start = Instant::now();
        info!(event = "job_started", job_name = "expire_segments", "Starting expiry sweep");

        let result = self.lifecycle.expire_assignments(Utc::now()).await;
        match &result {
            Ok(expired) => info!(
                event = "job_finished",
                job_name = "expire_segments",
                expired,
                duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Expiry sweep finished"
            ),
            Err(e) => error!(
                event = "job_failed",
                job_name = "expire_segments",
                error = %e,
                "Expiry sweep failed"
            ),
        }
        result
    }

    pub async fn stop(&self) {
        info!("Stopping expiry sweeper...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
