//! 房间注册表服务
//!
//! 所有房间的创建和成员变更都必须经过这里，依靠存储层唯一约束
//! 保证同一对用户并发请求时收敛到同一个房间。

use crate::errors::ApplicationResult;
use domain::entities::{
    compute_room_key, ChatRoom, RequestId, RoomAddress, RoomId, UserId,
};
use domain::errors::{DomainError, DomainResult};
use domain::repositories::ChatRoomRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct RoomService {
    room_repository: Arc<dyn ChatRoomRepository>,
}

impl RoomService {
    pub fn new(room_repository: Arc<dyn ChatRoomRepository>) -> Self {
        Self { room_repository }
    }

    /// 按两个主要成员取得或创建规范键房间
    ///
    /// 先按键查找，未命中则尝试创建；创建撞上唯一约束说明并发
    /// 竞争中另一方已创建成功，按键重新取回即可。两个并发调用
    /// 最终得到同一个房间。
    pub async fn get_or_create_room(
        &self,
        primary_members: [UserId; 2],
        producing_request_id: Option<RequestId>,
    ) -> ApplicationResult<ChatRoom> {
        let [a, b] = primary_members;
        if a == b {
            return Err(DomainError::validation_error(
                "members",
                "房间需要两个不同的成员",
            )
            .into());
        }

        let key = compute_room_key(&primary_members);
        if let Some(room) = self.room_repository.find_by_key(&key).await? {
            return Ok(room);
        }

        let room = ChatRoom::new_pair(a, b, producing_request_id);
        match self.room_repository.create(&room).await {
            Ok(created) => {
                tracing::info!(room_id = created.id, room_key = %key, "创建规范键房间");
                Ok(created)
            }
            Err(DomainError::Conflict { .. }) => {
                self.find_winner_by_key(&key).await.map_err(Into::into)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 创建临时房间（无规范键，成员在参数中给出）
    ///
    /// 审核房间走这条路径，并记录产生它的请求ID以便幂等复用。
    pub async fn create_adhoc(
        &self,
        members: &[UserId],
        producing_request_id: Option<RequestId>,
    ) -> ApplicationResult<ChatRoom> {
        let mut room = ChatRoom::new(producing_request_id);
        for member in members {
            room.add_member(*member);
        }
        let created = self.room_repository.create(&room).await?;
        tracing::info!(
            room_id = created.id,
            members = ?created.member_ids,
            "创建临时房间"
        );
        Ok(created)
    }

    /// 查找某个请求已产生的房间
    pub async fn find_by_producing_request(
        &self,
        request_id: RequestId,
    ) -> ApplicationResult<Option<ChatRoom>> {
        Ok(self
            .room_repository
            .find_by_producing_request(request_id)
            .await?)
    }

    /// 按地址（ID或规范键）解析房间
    pub async fn find_room(&self, address: &RoomAddress) -> ApplicationResult<ChatRoom> {
        let room = match address {
            RoomAddress::Id(id) => self.room_repository.find_by_id(*id).await?,
            RoomAddress::Key(key) => self.room_repository.find_by_key(key).await?,
        };
        room.ok_or_else(|| match address {
            RoomAddress::Id(id) => DomainError::not_found("chat_room", id).into(),
            RoomAddress::Key(key) => DomainError::not_found("chat_room", key).into(),
        })
    }

    /// 添加成员（幂等）
    pub async fn add_member(&self, room_id: RoomId, user_id: UserId) -> ApplicationResult<()> {
        self.room_repository.add_member(room_id, user_id).await?;
        Ok(())
    }

    /// 移除成员（幂等）
    pub async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> ApplicationResult<()> {
        self.room_repository.remove_member(room_id, user_id).await?;
        Ok(())
    }

    /// 把房间成员校正为给定集合（幂等）
    ///
    /// 审核房间在并发竞争后可能残留竞争失败一方创建时写入的
    /// 成员，赢得提交的一方用它收敛到准确的成员集合。
    pub async fn sync_members(
        &self,
        room_id: RoomId,
        members: &[UserId],
    ) -> ApplicationResult<ChatRoom> {
        let current = self.find_room(&RoomAddress::Id(room_id)).await?;
        for member_id in current.member_ids {
            if !members.contains(&member_id) {
                self.room_repository.remove_member(room_id, member_id).await?;
                tracing::info!(room_id, member_id, "移出房间成员");
            }
        }
        for member_id in members.iter().copied() {
            self.room_repository.add_member(room_id, member_id).await?;
        }
        self.find_room(&RoomAddress::Id(room_id)).await
    }

    /// 为房间绑定两个主要成员的规范键
    ///
    /// 键一旦设置不可变更；已有键时返回存储中生效的键。
    pub async fn bind_key(
        &self,
        room_id: RoomId,
        primary_members: [UserId; 2],
    ) -> ApplicationResult<String> {
        let key = compute_room_key(&primary_members);
        let effective = self
            .room_repository
            .assign_key_if_absent(room_id, &key)
            .await?;
        Ok(effective)
    }

    /// 关闭房间（历史消息保留）
    pub async fn close_room(&self, address: &RoomAddress) -> ApplicationResult<ChatRoom> {
        let mut room = self.find_room(address).await?;
        if room.is_active {
            self.room_repository.close(room.id).await?;
            room.close();
            tracing::info!(room_id = room.id, "关闭房间");
        }
        Ok(room)
    }

    /// 推进房间更新时间
    pub async fn touch(&self, room_id: RoomId, at: DateTime<Utc>) -> ApplicationResult<()> {
        self.room_repository.touch(room_id, at).await?;
        Ok(())
    }

    /// 列出用户参与的房间，最近活跃的在前
    pub async fn list_rooms_for_user(&self, user_id: UserId) -> ApplicationResult<Vec<ChatRoom>> {
        Ok(self.room_repository.list_for_member(user_id).await?)
    }

    async fn find_winner_by_key(&self, key: &str) -> DomainResult<ChatRoom> {
        self.room_repository
            .find_by_key(key)
            .await?
            .ok_or_else(|| DomainError::not_found("chat_room", key))
    }
}
