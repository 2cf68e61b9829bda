// 用户分段生命周期
// 组合存储库操作：配置用户分段、清理过期分段

mod orchestrator;
mod sweeper;

pub use orchestrator::SegmentLifecycle;
pub use sweeper::ExpirySweeper;
