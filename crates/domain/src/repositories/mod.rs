//! Repository接口定义
//!
//! 数据访问层的抽象接口：内层定义接口，外层实现接口。所有对
//! 聊天请求和房间的写入都必须经由这些接口，其他组件不得直接
//! 修改共享实体。

pub mod chat_request_repository;
pub mod chat_room_repository;
pub mod message_repository;

pub use chat_request_repository::ChatRequestRepository;
pub use chat_room_repository::ChatRoomRepository;
pub use message_repository::MessageRepository;

#[cfg(feature = "testing")]
pub use chat_request_repository::MockChatRequestRepository;
#[cfg(feature = "testing")]
pub use chat_room_repository::MockChatRoomRepository;
#[cfg(feature = "testing")]
pub use message_repository::MockMessageRepository;
