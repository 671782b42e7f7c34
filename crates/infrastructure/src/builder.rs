//! 基础设施组装
//!
//! 按配置建立连接池、执行迁移并装配全部适配器与服务，作为
//! 上层（HTTP门面、后台任务）的统一入口。

use std::sync::Arc;

use application::{
    ChatRequestService, ChatRequestServiceDependencies, MessageService,
    MessageServiceDependencies, RoomService, SystemClock,
};
use config::AppConfig;
use thiserror::Error;

use crate::broadcast::LocalEventHub;
use crate::db::repositories::{
    PgChatRequestRepository, PgChatRoomRepository, PgMessageRepository,
};
use crate::db::{create_pool, DbPool, MIGRATOR};
use crate::directory::{PgPetDirectory, PgUserDirectory};
use crate::notification::TracingNotificationEmitter;

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 装配完成的基础设施
#[derive(Clone)]
pub struct Infrastructure {
    pub pool: Arc<DbPool>,
    pub event_hub: Arc<LocalEventHub>,
    pub rooms: Arc<RoomService>,
    pub chat_requests: Arc<ChatRequestService>,
    pub messages: Arc<MessageService>,
}

impl Infrastructure {
    pub async fn connect(config: &AppConfig) -> Result<Self, InfrastructureError> {
        let pool = Arc::new(create_pool(&config.database).await?);
        MIGRATOR.run(&*pool).await?;

        let event_hub = Arc::new(LocalEventHub::from_config(&config.broadcast, &config.stream));
        let clock = Arc::new(SystemClock);

        let rooms = Arc::new(RoomService::new(Arc::new(PgChatRoomRepository::new(
            pool.clone(),
        ))));

        let chat_requests = Arc::new(ChatRequestService::new(ChatRequestServiceDependencies {
            request_repository: Arc::new(PgChatRequestRepository::new(pool.clone())),
            rooms: rooms.clone(),
            user_directory: Arc::new(PgUserDirectory::new(pool.clone())),
            pet_directory: Arc::new(PgPetDirectory::new(pool.clone())),
            notifier: event_hub.clone(),
            notifications: Arc::new(TracingNotificationEmitter),
            clock: clock.clone(),
        }));

        let messages = Arc::new(MessageService::new(MessageServiceDependencies {
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            rooms: rooms.clone(),
            notifier: event_hub.clone(),
            clock,
        }));

        tracing::info!("基础设施装配完成");
        Ok(Self {
            pool,
            event_hub,
            rooms,
            chat_requests,
            messages,
        })
    }
}
