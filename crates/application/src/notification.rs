//! 站内通知接口
//!
//! 与实时推送不同，站内通知是持久化的收件箱条目，离线用户
//! 上线后仍可见。投递同样是尽力而为的。

use crate::notifier::NotifyError;
use async_trait::async_trait;
use domain::entities::UserId;

/// 站内通知发送接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    async fn notify(
        &self,
        user_id: UserId,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// 尽力而为地发送站内通知，失败只留日志
pub(crate) async fn notify_quietly(
    emitter: &dyn NotificationEmitter,
    user_id: UserId,
    kind: &str,
    payload: serde_json::Value,
) {
    if let Err(err) = emitter.notify(user_id, kind, payload).await {
        tracing::warn!(user_id, kind, "站内通知发送失败，已忽略: {}", err);
    }
}
