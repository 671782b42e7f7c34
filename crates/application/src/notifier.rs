//! 实时事件推送接口
//!
//! 服务在状态变更后发布结构化事件，由基础设施层负责扇出给
//! 在线订阅者。推送是尽力而为的：投递失败只记录日志，绝不
//! 影响已完成的状态变更。

use async_trait::async_trait;
use domain::entities::{RoomId, UserId};
use domain::events::ChatEvent;
use serde::{Deserialize, Serialize};

/// 事件投递范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum EventScope {
    /// 投递给房间的所有在线成员
    Room(RoomId),
    /// 投递给单个用户的所有在线连接
    User(UserId),
}

/// 带投递范围的事件信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub scope: EventScope,
    #[serde(flatten)]
    pub event: ChatEvent,
}

/// 事件投递错误
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("事件投递失败: {0}")]
    Failed(String),
}

impl NotifyError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 实时推送接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), NotifyError>;
}

/// 尽力而为地发布事件，失败只留日志
pub(crate) async fn publish_quietly(
    notifier: &dyn RealtimeNotifier,
    scope: EventScope,
    event: ChatEvent,
) {
    let event_type = event.event_type();
    if let Err(err) = notifier.publish(EventEnvelope { scope, event }).await {
        tracing::warn!(event_type, "实时事件投递失败，已忽略: {}", err);
    }
}
