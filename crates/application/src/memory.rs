//! 内存版适配器实现
//!
//! 与数据库实现遵守同样的约束（配对唯一、房间键唯一、条件更新），
//! 服务层测试不需要数据库即可覆盖全部业务路径。

use crate::directory::{DirectoryError, PetDirectory, UserDirectory, UserProfile};
use crate::notification::NotificationEmitter;
use crate::notifier::{EventEnvelope, NotifyError, RealtimeNotifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::entities::{
    ChatRequest, ChatRequestStatus, ChatRoom, Message, MessageId, RequestId, RoomId, UserId,
};
use domain::errors::{DomainError, DomainResult};
use domain::repositories::{ChatRequestRepository, ChatRoomRepository, MessageRepository};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, RwLock};

/// 内存版聊天请求仓库
pub struct InMemoryChatRequestRepository {
    requests: RwLock<HashMap<RequestId, ChatRequest>>,
    next_id: AtomicI64,
}

impl InMemoryChatRequestRepository {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryChatRequestRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatRequestRepository for InMemoryChatRequestRepository {
    async fn create(&self, request: &ChatRequest) -> DomainResult<ChatRequest> {
        let mut requests = self.requests.write().await;

        // 模拟存储层的部分唯一约束：同配对只允许一个未拒绝的请求
        if let Some(target_id) = request.target_id {
            let occupied = requests.values().any(|existing| {
                existing.requester_id == request.requester_id
                    && existing.target_id == Some(target_id)
                    && existing.is_open()
            });
            if occupied {
                return Err(DomainError::conflict("该配对上已存在未拒绝的聊天请求"));
            }
        }

        let mut stored = request.clone();
        stored.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: RequestId) -> DomainResult<Option<ChatRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_open_by_pair(
        &self,
        requester_id: UserId,
        target_id: UserId,
    ) -> DomainResult<Option<ChatRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .find(|r| {
                r.requester_id == requester_id && r.target_id == Some(target_id) && r.is_open()
            })
            .cloned())
    }

    async fn update_guarded(
        &self,
        request: &ChatRequest,
        expected_status: ChatRequestStatus,
    ) -> DomainResult<bool> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&request.id) {
            None => Err(DomainError::not_found("chat_request", request.id)),
            Some(stored) if stored.status != expected_status => Ok(false),
            Some(stored) => {
                *stored = request.clone();
                Ok(true)
            }
        }
    }

    async fn list_by_status(&self, status: ChatRequestStatus) -> DomainResult<Vec<ChatRequest>> {
        let mut matched: Vec<ChatRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.id);
        Ok(matched)
    }

    async fn list_for_user(&self, user_id: UserId) -> DomainResult<Vec<ChatRequest>> {
        let mut matched: Vec<ChatRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.requester_id == user_id || r.target_id == Some(user_id))
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.id);
        Ok(matched)
    }
}

/// 内存版聊天房间仓库
pub struct InMemoryChatRoomRepository {
    rooms: RwLock<HashMap<RoomId, ChatRoom>>,
    next_id: AtomicI64,
}

impl InMemoryChatRoomRepository {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryChatRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatRoomRepository for InMemoryChatRoomRepository {
    async fn create(&self, room: &ChatRoom) -> DomainResult<ChatRoom> {
        let mut rooms = self.rooms.write().await;

        // 模拟存储层的唯一约束：规范键、产生请求各自唯一
        if let Some(key) = &room.room_key {
            if rooms.values().any(|r| r.room_key.as_ref() == Some(key)) {
                return Err(DomainError::conflict(format!("房间键已存在: {}", key)));
            }
        }
        if let Some(request_id) = room.producing_request_id {
            if rooms
                .values()
                .any(|r| r.producing_request_id == Some(request_id))
            {
                return Err(DomainError::conflict(format!(
                    "请求 {} 已产生过房间",
                    request_id
                )));
            }
        }

        let mut stored = room.clone();
        stored.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        rooms.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: RoomId) -> DomainResult<Option<ChatRoom>> {
        Ok(self.rooms.read().await.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &str) -> DomainResult<Option<ChatRoom>> {
        Ok(self
            .rooms
            .read()
            .await
            .values()
            .find(|r| r.room_key.as_deref() == Some(key))
            .cloned())
    }

    async fn find_by_producing_request(
        &self,
        request_id: RequestId,
    ) -> DomainResult<Option<ChatRoom>> {
        Ok(self
            .rooms
            .read()
            .await
            .values()
            .find(|r| r.producing_request_id == Some(request_id))
            .cloned())
    }

    async fn add_member(&self, room_id: RoomId, user_id: UserId) -> DomainResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| DomainError::not_found("chat_room", room_id))?;
        room.add_member(user_id);
        Ok(())
    }

    async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> DomainResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| DomainError::not_found("chat_room", room_id))?;
        room.remove_member(user_id);
        Ok(())
    }

    async fn assign_key_if_absent(&self, room_id: RoomId, key: &str) -> DomainResult<String> {
        let mut rooms = self.rooms.write().await;

        let taken_by_other = rooms
            .values()
            .any(|r| r.id != room_id && r.room_key.as_deref() == Some(key));

        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| DomainError::not_found("chat_room", room_id))?;
        match &room.room_key {
            Some(existing) => Ok(existing.clone()),
            None => {
                if taken_by_other {
                    return Err(DomainError::conflict(format!("房间键已存在: {}", key)));
                }
                room.assign_key(key.to_string())?;
                Ok(key.to_string())
            }
        }
    }

    async fn close(&self, room_id: RoomId) -> DomainResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| DomainError::not_found("chat_room", room_id))?;
        room.close();
        Ok(())
    }

    async fn touch(&self, room_id: RoomId, at: DateTime<Utc>) -> DomainResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&room_id)
            .ok_or_else(|| DomainError::not_found("chat_room", room_id))?;
        room.updated_at = at;
        Ok(())
    }

    async fn list_for_member(&self, user_id: UserId) -> DomainResult<Vec<ChatRoom>> {
        let mut matched: Vec<ChatRoom> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|r| r.is_member(user_id))
            .cloned()
            .collect();
        // 最近活跃的房间排在前面
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matched)
    }
}

/// 内存版消息仓库
pub struct InMemoryMessageRepository {
    messages: RwLock<HashMap<MessageId, Message>>,
    next_id: AtomicI64,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryMessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: &Message) -> DomainResult<Message> {
        let mut messages = self.messages.write().await;
        let mut stored = message.clone();
        stored.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        messages.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<Message>> {
        Ok(self.messages.read().await.get(&id).cloned())
    }

    async fn list_since(
        &self,
        room_id: RoomId,
        since_id: MessageId,
    ) -> DomainResult<Vec<Message>> {
        let mut matched: Vec<Message> = self
            .messages
            .read()
            .await
            .values()
            .filter(|m| m.room_id == room_id && m.id > since_id)
            .cloned()
            .collect();
        matched.sort_by_key(|m| m.id);
        Ok(matched)
    }

    async fn mark_read(&self, room_id: RoomId, reader_id: UserId) -> DomainResult<u64> {
        let mut messages = self.messages.write().await;
        let mut affected = 0;
        for message in messages.values_mut() {
            if message.room_id == room_id && message.sender_id != reader_id && !message.is_read {
                message.mark_read();
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn update(&self, message: &Message) -> DomainResult<()> {
        let mut messages = self.messages.write().await;
        match messages.get_mut(&message.id) {
            None => Err(DomainError::not_found("message", message.id)),
            Some(stored) => {
                *stored = message.clone();
                Ok(())
            }
        }
    }
}

/// 内存版用户目录
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserProfile) {
        self.users.write().await.insert(profile.id, profile);
    }

    pub async fn insert_stub(&self, id: UserId, name: &str) {
        self.insert(UserProfile {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name),
        })
        .await;
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: UserId) -> Result<Option<UserProfile>, DirectoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

/// 内存版宠物目录
#[derive(Default)]
pub struct InMemoryPetDirectory {
    contacts: RwLock<HashMap<i64, UserId>>,
}

impl InMemoryPetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_contact(&self, pet_id: i64, contact_id: UserId) {
        self.contacts.write().await.insert(pet_id, contact_id);
    }
}

#[async_trait]
impl PetDirectory for InMemoryPetDirectory {
    async fn get_pet_contact(&self, pet_id: i64) -> Result<Option<UserId>, DirectoryError> {
        Ok(self.contacts.read().await.get(&pet_id).copied())
    }
}

/// 记录所有已发布事件的通知器
#[derive(Default)]
pub struct RecordingNotifier {
    envelopes: Mutex<Vec<EventEnvelope>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn envelopes(&self) -> Vec<EventEnvelope> {
        self.envelopes.lock().await.clone()
    }

    pub async fn event_types(&self) -> Vec<&'static str> {
        self.envelopes
            .lock()
            .await
            .iter()
            .map(|e| e.event.event_type())
            .collect()
    }
}

#[async_trait]
impl RealtimeNotifier for RecordingNotifier {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), NotifyError> {
        self.envelopes.lock().await.push(envelope);
        Ok(())
    }
}

/// 总是失败的通知器，用于验证推送失败不影响业务结果
#[derive(Default)]
pub struct FailingNotifier;

#[async_trait]
impl RealtimeNotifier for FailingNotifier {
    async fn publish(&self, _envelope: EventEnvelope) -> Result<(), NotifyError> {
        Err(NotifyError::failed("广播通道不可用"))
    }
}

/// 记录所有站内通知的发送器
#[derive(Default)]
pub struct RecordingNotificationEmitter {
    notices: Mutex<Vec<(UserId, String, serde_json::Value)>>,
}

impl RecordingNotificationEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notices(&self) -> Vec<(UserId, String, serde_json::Value)> {
        self.notices.lock().await.clone()
    }
}

#[async_trait]
impl NotificationEmitter for RecordingNotificationEmitter {
    async fn notify(
        &self,
        user_id: UserId,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .await
            .push((user_id, kind.to_string(), payload));
        Ok(())
    }
}
