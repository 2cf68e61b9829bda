// 数据库模块
// 包含数据库实体定义和存储库实现

pub mod models; // 数据库实体定义
pub mod repositories; // 存储库接口与实现

// 重新导出常用类型，方便其他模块使用
pub use models::segment::{SegmentAssignment, SegmentEntity, UserSegmentEntity};
pub use models::user::UserEntity;
pub use repositories::{InMemoryRepository, PgRepository, Repository};
