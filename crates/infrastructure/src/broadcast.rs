//! 进程内事件广播
//!
//! 单个广播通道承载全部事件信封，订阅端按投递范围过滤。推送流
//! 受空闲超时和最大存活时间约束，超限后自行终止，客户端重连并
//! 按水位线补齐错过的消息。

use application::{EventEnvelope, EventScope, NotifyError, RealtimeNotifier};
use async_trait::async_trait;
use config::{BroadcastConfig, StreamConfig};
use futures_util::stream::Stream;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

#[derive(Clone)]
pub struct LocalEventHub {
    sender: broadcast::Sender<EventEnvelope>,
    idle_timeout: Duration,
    max_lifetime: Duration,
}

impl LocalEventHub {
    pub fn new(capacity: usize, idle_timeout: Duration, max_lifetime: Duration) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            idle_timeout,
            max_lifetime,
        }
    }

    pub fn from_config(broadcast: &BroadcastConfig, stream: &StreamConfig) -> Self {
        Self::new(
            broadcast.capacity,
            Duration::from_secs(stream.idle_timeout_secs),
            Duration::from_secs(stream.max_lifetime_secs),
        )
    }

    /// 订阅某个投递范围内的事件
    ///
    /// 慢订阅者滞后时丢弃积压并继续，错过的内容由客户端按水位线
    /// 拉取补齐；流在空闲超时或到达最大存活时间后结束。
    pub fn subscribe(&self, scope: EventScope) -> impl Stream<Item = EventEnvelope> {
        let mut receiver = self.sender.subscribe();
        let idle_timeout = self.idle_timeout;
        let deadline = Instant::now() + self.max_lifetime;

        async_stream::stream! {
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    tracing::debug!(?scope, "推送流到达最大存活时间");
                    break;
                }

                let wait = idle_timeout.min(remaining);
                match tokio::time::timeout(wait, receiver.recv()).await {
                    Err(_) => {
                        tracing::debug!(?scope, "推送流空闲超时");
                        break;
                    }
                    Ok(Err(broadcast::error::RecvError::Closed)) => break,
                    Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        tracing::warn!(?scope, skipped, "订阅者滞后，丢弃积压事件");
                        continue;
                    }
                    Ok(Ok(envelope)) => {
                        if envelope.scope == scope {
                            yield envelope;
                        }
                    }
                }
            }
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl RealtimeNotifier for LocalEventHub {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), NotifyError> {
        // 没有订阅者不算失败，事件本来就是尽力而为的
        if self.sender.receiver_count() == 0 {
            return Ok(());
        }
        self.sender
            .send(envelope)
            .map(|_| ())
            .map_err(|err| NotifyError::failed(err.to_string()))
    }
}
