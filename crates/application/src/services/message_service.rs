//! 消息服务
//!
//! 消息收发、水位线增量拉取、批量已读和图片软删除。写入要求
//! 发送者是房间成员且房间开放；读取不做成员校验，未参与审核的
//! 管理员因此天然获得只读访问。

use crate::clock::Clock;
use crate::errors::ApplicationResult;
use crate::notifier::{publish_quietly, EventScope, RealtimeNotifier};
use crate::services::room_service::RoomService;
use domain::entities::{Message, MessageId, RoomAddress, UserId};
use domain::errors::DomainError;
use domain::events::ChatEvent;
use domain::repositories::MessageRepository;
use std::sync::Arc;

/// 发送消息的输入
///
/// 带 `image_url` 的是图片消息（`content` 作为说明文字），否则
/// 为纯文本消息。
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub room: RoomAddress,
    pub sender_id: UserId,
    pub content: Option<String>,
    pub image_url: Option<String>,
}

/// 服务依赖集合
pub struct MessageServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub rooms: Arc<RoomService>,
    pub notifier: Arc<dyn RealtimeNotifier>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessageService {
    message_repository: Arc<dyn MessageRepository>,
    rooms: Arc<RoomService>,
    notifier: Arc<dyn RealtimeNotifier>,
    clock: Arc<dyn Clock>,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self {
            message_repository: deps.message_repository,
            rooms: deps.rooms,
            notifier: deps.notifier,
            clock: deps.clock,
        }
    }

    /// 发送消息
    pub async fn send_message(&self, command: SendMessageCommand) -> ApplicationResult<Message> {
        let room = self.rooms.find_room(&command.room).await?;
        if !room.is_active {
            return Err(
                DomainError::conflict("房间已关闭，不能继续发送消息").into(),
            );
        }
        if !room.is_member(command.sender_id) {
            return Err(DomainError::permission_denied("只有房间成员可以发送消息").into());
        }

        let message = match (command.content, command.image_url) {
            (caption, Some(image_url)) => {
                Message::new_image(room.id, command.sender_id, image_url, caption)?
            }
            (Some(content), None) => Message::new_text(room.id, command.sender_id, content)?,
            (None, None) => {
                return Err(DomainError::validation_error(
                    "content",
                    "消息必须包含文本或图片",
                )
                .into());
            }
        };

        let stored = self.message_repository.append(&message).await?;
        self.rooms.touch(room.id, stored.created_at).await?;

        tracing::debug!(
            room_id = room.id,
            message_id = stored.id,
            sender_id = stored.sender_id,
            kind = stored.kind.as_str(),
            "消息已追加"
        );

        publish_quietly(
            self.notifier.as_ref(),
            EventScope::Room(room.id),
            ChatEvent::MessageSent {
                message: stored.clone(),
            },
        )
        .await;

        Ok(stored)
    }

    /// 按水位线增量拉取消息
    ///
    /// 返回房间内ID大于 `since_id` 的消息，按创建顺序排列；
    /// `since_id` 为 0 时返回全部历史。
    pub async fn list_messages(
        &self,
        room: &RoomAddress,
        since_id: MessageId,
    ) -> ApplicationResult<Vec<Message>> {
        let room = self.rooms.find_room(room).await?;
        Ok(self.message_repository.list_since(room.id, since_id).await?)
    }

    /// 批量已读：把房间内他人发送的未读消息标记为已读
    pub async fn mark_read(
        &self,
        room: &RoomAddress,
        reader_id: UserId,
    ) -> ApplicationResult<u64> {
        let room = self.rooms.find_room(room).await?;
        if !room.is_member(reader_id) {
            return Err(DomainError::permission_denied("只有房间成员可以标记已读").into());
        }

        let affected = self.message_repository.mark_read(room.id, reader_id).await?;
        if affected > 0 {
            tracing::debug!(room_id = room.id, reader_id, affected, "批量标记已读");
            publish_quietly(
                self.notifier.as_ref(),
                EventScope::Room(room.id),
                ChatEvent::MessagesRead {
                    room_id: room.id,
                    reader_id,
                },
            )
            .await;
        }
        Ok(affected)
    }

    /// 软删除图片消息
    ///
    /// 仅发送者本人可删；图片引用被清除，说明文字保留，消息行
    /// 不会物理删除。
    pub async fn soft_delete_image(
        &self,
        message_id: MessageId,
        actor_id: UserId,
    ) -> ApplicationResult<Message> {
        let mut message = self
            .message_repository
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| DomainError::not_found("message", message_id))?;

        message.soft_delete_image(actor_id, self.clock.now())?;
        self.message_repository.update(&message).await?;

        tracing::info!(message_id, actor_id, "图片消息已软删除");

        publish_quietly(
            self.notifier.as_ref(),
            EventScope::Room(message.room_id),
            ChatEvent::MessageImageDeleted {
                message: message.clone(),
            },
        )
        .await;

        Ok(message)
    }

    /// 发布正在输入指示（瞬态事件，不落库）
    pub async fn publish_typing(
        &self,
        room: &RoomAddress,
        user_id: UserId,
    ) -> ApplicationResult<()> {
        let room = self.rooms.find_room(room).await?;
        if !room.is_member(user_id) {
            return Err(DomainError::permission_denied("只有房间成员可以发送输入指示").into());
        }
        publish_quietly(
            self.notifier.as_ref(),
            EventScope::Room(room.id),
            ChatEvent::Typing {
                room_id: room.id,
                user_id,
            },
        )
        .await;
        Ok(())
    }

    /// 发布在线状态变化（瞬态事件，不落库）
    pub async fn publish_presence(
        &self,
        room: &RoomAddress,
        user_id: UserId,
        online: bool,
    ) -> ApplicationResult<()> {
        let room = self.rooms.find_room(room).await?;
        if !room.is_member(user_id) {
            return Err(DomainError::permission_denied("只有房间成员可以发布在线状态").into());
        }
        publish_quietly(
            self.notifier.as_ref(),
            EventScope::Room(room.id),
            ChatEvent::Presence {
                room_id: room.id,
                user_id,
                online,
            },
        )
        .await;
        Ok(())
    }
}
