//! 站内通知适配器

use application::{NotificationEmitter, NotifyError};
use async_trait::async_trait;
use domain::entities::UserId;

/// 把站内通知写入结构化日志的发送器
///
/// 通知收件箱属于主站，聊天核心只负责把通知内容交出去；没有
/// 接入下游系统时用这个实现留痕。
#[derive(Debug, Default, Clone)]
pub struct TracingNotificationEmitter;

#[async_trait]
impl NotificationEmitter for TracingNotificationEmitter {
    async fn notify(
        &self,
        user_id: UserId,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(user_id, kind, %payload, "站内通知");
        Ok(())
    }
}
