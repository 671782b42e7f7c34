//! 消息Repository接口定义

use crate::entities::{Message, MessageId, RoomId, UserId};
use crate::errors::DomainResult;
use async_trait::async_trait;

/// 消息Repository接口
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 追加消息，返回带存储分配ID的实体
    ///
    /// 分配的ID在房间内随创建时间单调递增，轮询客户端据此使用
    /// 水位线增量拉取。
    async fn append(&self, message: &Message) -> DomainResult<Message>;

    /// 根据ID查找消息
    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<Message>>;

    /// 按创建顺序列出房间内ID大于水位线的消息
    async fn list_since(&self, room_id: RoomId, since_id: MessageId)
        -> DomainResult<Vec<Message>>;

    /// 批量已读：将房间内非 reader 发送的未读消息标记为已读
    ///
    /// 返回受影响的消息数。
    async fn mark_read(&self, room_id: RoomId, reader_id: UserId) -> DomainResult<u64>;

    /// 更新消息的可变字段（已读标记、图片软删除）
    async fn update(&self, message: &Message) -> DomainResult<()>;
}
