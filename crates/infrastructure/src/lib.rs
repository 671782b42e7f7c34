//! 基础设施层实现
//!
//! 提供数据库仓储、事件广播、目录查询等适配器，实现应用/领域层
//! 定义的接口。

pub mod broadcast;
pub mod builder;
pub mod db;
pub mod directory;
pub mod notification;

pub use broadcast::LocalEventHub;
pub use builder::{Infrastructure, InfrastructureError};
pub use db::{create_pool, DbPool, MIGRATOR};
pub use db::repositories::{
    PgChatRequestRepository, PgChatRoomRepository, PgMessageRepository,
};
pub use directory::{PgPetDirectory, PgUserDirectory};
pub use notification::TracingNotificationEmitter;
