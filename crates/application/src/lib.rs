//! 应用服务层
//!
//! 编排领域实体与Repository，实现聊天请求审核流、房间注册表
//! 与消息收发的业务用例。对外部协作方（用户目录、宠物目录、
//! 实时推送、站内通知）只依赖本层定义的接口。

pub mod clock;
pub mod directory;
pub mod errors;
pub mod memory;
pub mod notification;
pub mod notifier;
pub mod services;

pub use clock::{Clock, SystemClock};
pub use directory::{DirectoryError, PetDirectory, UserDirectory, UserProfile};
pub use errors::{ApplicationError, ApplicationResult};
pub use notification::NotificationEmitter;
pub use notifier::{EventEnvelope, EventScope, NotifyError, RealtimeNotifier};
pub use services::{
    ChatRequestService, ChatRequestServiceDependencies, CreateRequestCommand, MessageService,
    MessageServiceDependencies, RoomService, SendMessageCommand,
};
