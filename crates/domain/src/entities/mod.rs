//! 领域实体定义

pub mod chat_request;
pub mod chat_room;
pub mod message;

pub use chat_request::{ChatRequest, ChatRequestStatus, RequestKind};
pub use chat_room::{compute_room_key, ChatRoom, RoomAddress};
pub use message::{Message, MessageKind};

/// 用户ID（来自外部用户目录的数字主键）
pub type UserId = i64;
/// 聊天请求ID
pub type RequestId = i64;
/// 聊天房间ID
pub type RoomId = i64;
/// 消息ID
pub type MessageId = i64;
