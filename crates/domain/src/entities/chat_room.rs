//! 聊天房间实体定义
//!
//! 房间的规范键由两个非管理员成员的数字ID升序拼接得到，与数据库
//! 主键无关，客户端无需知道管理员身份即可定位房间。

use crate::entities::{RequestId, RoomId, UserId};
use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 计算房间规范键：成员ID升序排列，以 `_` 拼接
///
/// `compute_room_key(&[6, 3])` 与 `compute_room_key(&[3, 6])` 均得到 `"3_6"`。
pub fn compute_room_key(members: &[UserId]) -> String {
    let mut sorted = members.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join("_")
}

/// 房间寻址方式：数字ID或规范键
///
/// 审核房间在键生成之前只能按ID寻址，生效后两种方式等价。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomAddress {
    Id(RoomId),
    Key(String),
}

impl From<RoomId> for RoomAddress {
    fn from(id: RoomId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for RoomAddress {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

/// 聊天房间实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    /// 房间ID（由存储层分配，持久化前为0）
    pub id: RoomId,
    /// 规范键（可计算出之前为空；一旦设置不可变更）
    pub room_key: Option<String>,
    /// 成员用户ID集合
    pub member_ids: Vec<UserId>,
    /// 是否开放
    pub is_active: bool,
    /// 产生该房间的聊天请求（管理员直接发起的房间没有）
    pub producing_request_id: Option<RequestId>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间（消息追加时推进）
    pub updated_at: DateTime<Utc>,
}

impl ChatRoom {
    /// 创建空房间（成员随后逐个加入）
    pub fn new(producing_request_id: Option<RequestId>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            room_key: None,
            member_ids: Vec::new(),
            is_active: true,
            producing_request_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// 创建两人房间，规范键立即可计算
    pub fn new_pair(a: UserId, b: UserId, producing_request_id: Option<RequestId>) -> Self {
        let mut room = Self::new(producing_request_id);
        room.member_ids = if a <= b { vec![a, b] } else { vec![b, a] };
        room.room_key = Some(compute_room_key(&[a, b]));
        room
    }

    /// 添加成员（幂等，已存在时返回 false）
    pub fn add_member(&mut self, user_id: UserId) -> bool {
        if self.member_ids.contains(&user_id) {
            return false;
        }
        self.member_ids.push(user_id);
        self.updated_at = Utc::now();
        true
    }

    /// 移除成员（幂等，不存在时返回 false）
    pub fn remove_member(&mut self, user_id: UserId) -> bool {
        let before = self.member_ids.len();
        self.member_ids.retain(|id| *id != user_id);
        if self.member_ids.len() == before {
            return false;
        }
        self.updated_at = Utc::now();
        true
    }

    /// 检查用户是否为房间成员
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member_ids.contains(&user_id)
    }

    /// 设置规范键（只允许设置一次）
    pub fn assign_key(&mut self, key: String) -> DomainResult<()> {
        match &self.room_key {
            Some(existing) if *existing == key => Ok(()),
            Some(existing) => Err(DomainError::conflict(format!(
                "房间键一旦设置不可变更: 已有 {}，收到 {}",
                existing, key
            ))),
            None => {
                self.room_key = Some(key);
                self.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    /// 关闭房间（消息保留）
    pub fn close(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_key_order_independent() {
        assert_eq!(compute_room_key(&[3, 6]), "3_6");
        assert_eq!(compute_room_key(&[6, 3]), "3_6");
        assert_eq!(compute_room_key(&[100, 2]), "2_100");
    }

    #[test]
    fn test_pair_room_has_key() {
        let room = ChatRoom::new_pair(6, 3, None);
        assert_eq!(room.room_key.as_deref(), Some("3_6"));
        assert_eq!(room.member_ids, vec![3, 6]);
        assert!(room.is_active);
    }

    #[test]
    fn test_add_member_idempotent() {
        let mut room = ChatRoom::new(Some(1));
        assert!(room.add_member(1));
        assert!(room.add_member(3));
        assert!(!room.add_member(3));
        assert_eq!(room.member_ids, vec![1, 3]);
    }

    #[test]
    fn test_remove_member_idempotent() {
        let mut room = ChatRoom::new(Some(1));
        room.add_member(1);
        room.add_member(3);

        assert!(room.remove_member(1));
        assert!(!room.remove_member(1));
        assert_eq!(room.member_ids, vec![3]);
    }

    #[test]
    fn test_key_immutable_once_set() {
        let mut room = ChatRoom::new(None);
        room.assign_key("3_6".to_string()).unwrap();

        // 相同键重复设置是无害的
        assert!(room.assign_key("3_6".to_string()).is_ok());

        let err = room.assign_key("3_7".to_string()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
        assert_eq!(room.room_key.as_deref(), Some("3_6"));
    }

    #[test]
    fn test_close_keeps_members() {
        let mut room = ChatRoom::new_pair(3, 6, None);
        room.close();
        assert!(!room.is_active);
        assert_eq!(room.member_ids.len(), 2);
    }
}
