//! 聊天相关的领域事件
//!
//! 事件采用自描述的标签格式（`type` + `data`），新增事件种类
//! 不会破坏既有消费者。

use crate::entities::{ChatRequest, Message, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// 聊天相关的领域事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    /// 聊天请求创建事件
    RequestCreated { request: ChatRequest },

    /// 管理员开始审核事件
    VerificationStarted { request: ChatRequest },

    /// 请求批准生效事件
    RequestApproved { request: ChatRequest },

    /// 请求被拒绝事件
    RequestRejected { request: ChatRequest },

    /// 成员加入房间事件
    MemberAdded { room_id: RoomId, user_id: UserId },

    /// 消息发送事件
    MessageSent { message: Message },

    /// 房间消息被批量已读事件
    MessagesRead { room_id: RoomId, reader_id: UserId },

    /// 图片消息被软删除事件
    MessageImageDeleted { message: Message },

    /// 正在输入事件
    Typing { room_id: RoomId, user_id: UserId },

    /// 在线状态事件
    Presence {
        room_id: RoomId,
        user_id: UserId,
        online: bool,
    },
}

impl ChatEvent {
    /// 获取事件类型标签
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::RequestCreated { .. } => "request_created",
            ChatEvent::VerificationStarted { .. } => "verification_started",
            ChatEvent::RequestApproved { .. } => "request_approved",
            ChatEvent::RequestRejected { .. } => "request_rejected",
            ChatEvent::MemberAdded { .. } => "member_added",
            ChatEvent::MessageSent { .. } => "message_sent",
            ChatEvent::MessagesRead { .. } => "messages_read",
            ChatEvent::MessageImageDeleted { .. } => "message_image_deleted",
            ChatEvent::Typing { .. } => "typing",
            ChatEvent::Presence { .. } => "presence",
        }
    }

    /// 获取事件涉及的房间ID（如果有）
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            ChatEvent::MemberAdded { room_id, .. }
            | ChatEvent::MessagesRead { room_id, .. }
            | ChatEvent::Typing { room_id, .. }
            | ChatEvent::Presence { room_id, .. } => Some(*room_id),
            ChatEvent::MessageSent { message } | ChatEvent::MessageImageDeleted { message } => {
                Some(message.room_id)
            }
            ChatEvent::RequestCreated { request }
            | ChatEvent::VerificationStarted { request }
            | ChatEvent::RequestApproved { request }
            | ChatEvent::RequestRejected { request } => request.final_room_id,
        }
    }
}
