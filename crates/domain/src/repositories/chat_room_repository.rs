//! 聊天房间Repository接口定义

use crate::entities::{ChatRoom, RequestId, RoomId, UserId};
use crate::errors::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 聊天房间Repository接口
///
/// 成员变更是独立的幂等操作而非整行覆盖，保证并发加入不会
/// 相互覆盖丢失成员。
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ChatRoomRepository: Send + Sync {
    /// 创建房间（连同成员集合），返回带存储分配ID的实体
    ///
    /// 规范键冲突时返回冲突错误，由存储层唯一约束保证；调用方
    /// 应按键重新查找已存在的房间。
    async fn create(&self, room: &ChatRoom) -> DomainResult<ChatRoom>;

    /// 根据ID查找房间
    async fn find_by_id(&self, id: RoomId) -> DomainResult<Option<ChatRoom>>;

    /// 根据规范键查找房间
    async fn find_by_key(&self, key: &str) -> DomainResult<Option<ChatRoom>>;

    /// 查找由某个聊天请求产生的房间（审核房间按请求ID幂等复用）
    async fn find_by_producing_request(&self, request_id: RequestId)
        -> DomainResult<Option<ChatRoom>>;

    /// 添加成员（幂等，成员已存在时为空操作）
    async fn add_member(&self, room_id: RoomId, user_id: UserId) -> DomainResult<()>;

    /// 移除成员（幂等，成员不存在时为空操作）
    async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> DomainResult<()>;

    /// 仅当房间尚无规范键时设置；返回存储中最终生效的键
    async fn assign_key_if_absent(&self, room_id: RoomId, key: &str) -> DomainResult<String>;

    /// 关闭房间（不删除消息）
    async fn close(&self, room_id: RoomId) -> DomainResult<()>;

    /// 推进房间的更新时间（消息追加时调用）
    async fn touch(&self, room_id: RoomId, at: DateTime<Utc>) -> DomainResult<()>;

    /// 列出用户参与的房间
    async fn list_for_member(&self, user_id: UserId) -> DomainResult<Vec<ChatRoom>>;
}
