//! 消息实体定义
//!
//! 消息一经创建不可变，仅允许已读标记和图片软删除两种修改。

use crate::entities::{MessageId, RoomId, UserId};
use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// 文本消息
    Text,
    /// 图片消息
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(DomainError::validation_error(
                "kind",
                format!("未知的消息类型: {}", other),
            )),
        }
    }
}

/// 消息实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// 消息ID（由存储层分配，持久化前为0；同房间内单调递增）
    pub id: MessageId,
    /// 所属房间ID
    pub room_id: RoomId,
    /// 发送者用户ID
    pub sender_id: UserId,
    /// 消息类型
    pub kind: MessageKind,
    /// 文本内容
    pub content: Option<String>,
    /// 图片引用（软删除后清空）
    pub image_url: Option<String>,
    /// 是否已被非发送者阅读
    pub is_read: bool,
    /// 图片是否被软删除
    pub is_deleted: bool,
    /// 软删除时间
    pub deleted_at: Option<DateTime<Utc>>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// 创建文本消息
    pub fn new_text(room_id: RoomId, sender_id: UserId, content: String) -> DomainResult<Self> {
        Self::validate_content(&content)?;

        Ok(Self {
            id: 0,
            room_id,
            sender_id,
            kind: MessageKind::Text,
            content: Some(content),
            image_url: None,
            is_read: false,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
        })
    }

    /// 创建图片消息（可附带文字说明）
    pub fn new_image(
        room_id: RoomId,
        sender_id: UserId,
        image_url: String,
        caption: Option<String>,
    ) -> DomainResult<Self> {
        if image_url.trim().is_empty() {
            return Err(DomainError::validation_error(
                "image_url",
                "图片引用不能为空",
            ));
        }

        Ok(Self {
            id: 0,
            room_id,
            sender_id,
            kind: MessageKind::Image,
            content: caption.filter(|c| !c.trim().is_empty()),
            image_url: Some(image_url),
            is_read: false,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
        })
    }

    /// 标记为已读
    pub fn mark_read(&mut self) {
        self.is_read = true;
    }

    /// 软删除图片
    ///
    /// 只有原发送者可以撤回图片；消息记录保留以维持排序和审计，
    /// 文字说明不变。
    pub fn soft_delete_image(&mut self, actor_id: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        if self.kind != MessageKind::Image {
            return Err(DomainError::validation_error(
                "kind",
                "只有图片消息支持软删除",
            ));
        }

        if self.sender_id != actor_id {
            return Err(DomainError::permission_denied("只有发送者可以删除图片"));
        }

        if self.is_deleted {
            return Err(DomainError::conflict("图片已被删除"));
        }

        self.image_url = None;
        self.is_deleted = true;
        self.deleted_at = Some(now);
        Ok(())
    }

    /// 验证文本内容
    fn validate_content(content: &str) -> DomainResult<()> {
        if content.trim().is_empty() {
            return Err(DomainError::validation_error("content", "消息内容不能为空"));
        }

        if content.len() > 10000 {
            return Err(DomainError::validation_error(
                "content",
                "消息内容不能超过10000个字符",
            ));
        }

        Ok(())
    }
}
