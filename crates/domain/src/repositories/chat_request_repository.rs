//! 聊天请求Repository接口定义

use crate::entities::{ChatRequest, ChatRequestStatus, RequestId, UserId};
use crate::errors::DomainResult;
use async_trait::async_trait;

/// 聊天请求Repository接口
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ChatRequestRepository: Send + Sync {
    /// 创建新请求，返回带存储分配ID的实体
    ///
    /// 同一 (requester, target) 配对已存在未拒绝的请求时返回冲突，
    /// 由存储层唯一约束保证。
    async fn create(&self, request: &ChatRequest) -> DomainResult<ChatRequest>;

    /// 根据ID查找请求
    async fn find_by_id(&self, id: RequestId) -> DomainResult<Option<ChatRequest>>;

    /// 查找某配对上仍然占用的请求（状态不为 rejected）
    async fn find_open_by_pair(
        &self,
        requester_id: UserId,
        target_id: UserId,
    ) -> DomainResult<Option<ChatRequest>>;

    /// 条件更新：仅当存储中的状态仍为 `expected_status` 时写入
    ///
    /// 返回 false 表示乐观并发检查失败（状态已被并发修改），
    /// 调用方应重新读取并报告冲突。
    async fn update_guarded(
        &self,
        request: &ChatRequest,
        expected_status: ChatRequestStatus,
    ) -> DomainResult<bool>;

    /// 按状态列出请求（管理员工作台）
    async fn list_by_status(&self, status: ChatRequestStatus) -> DomainResult<Vec<ChatRequest>>;

    /// 列出用户作为请求者或目标参与的请求
    async fn list_for_user(&self, user_id: UserId) -> DomainResult<Vec<ChatRequest>>;
}
