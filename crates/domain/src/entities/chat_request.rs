//! 聊天请求实体定义
//!
//! 聊天请求是三方审核流水线的核心聚合：请求者发起联系意图，
//! 管理员介入审核，审核通过后目标用户被拉入同一个房间。

use crate::entities::{RequestId, RoomId, UserId};
use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 聊天请求状态枚举
///
/// 字符串值是对外契约的一部分，客户端依赖这些确切的取值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRequestStatus {
    /// 待处理
    Pending,
    /// 管理员审核中
    AdminVerifying,
    /// 管理员已批准（遗留路径，等待目标用户答复）
    AdminApproved,
    /// 已生效（终态）
    Active,
    /// 已拒绝（终态）
    Rejected,
}

impl ChatRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AdminVerifying => "admin_verifying",
            Self::AdminApproved => "admin_approved",
            Self::Active => "active",
            Self::Rejected => "rejected",
        }
    }

    /// 从存储的字符串值解析状态
    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "admin_verifying" => Ok(Self::AdminVerifying),
            "admin_approved" => Ok(Self::AdminApproved),
            "active" => Ok(Self::Active),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::validation_error(
                "status",
                format!("未知的请求状态: {}", other),
            )),
        }
    }
}

impl std::fmt::Display for ChatRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 请求分类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// 认领走失宠物
    Claim,
    /// 领养咨询
    Adoption,
    /// 一般联系
    General,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Adoption => "adoption",
            Self::General => "general",
        }
    }

    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "claim" => Ok(Self::Claim),
            "adoption" => Ok(Self::Adoption),
            "general" => Ok(Self::General),
            other => Err(DomainError::validation_error(
                "kind",
                format!("未知的请求分类: {}", other),
            )),
        }
    }
}

/// 聊天请求实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// 请求ID（由存储层分配，持久化前为0）
    pub id: RequestId,
    /// 请求者用户ID
    pub requester_id: UserId,
    /// 目标用户ID（管理员解析完成前可为空）
    pub target_id: Option<UserId>,
    /// 关联宠物ID（仅作上下文）
    pub pet_id: Option<i64>,
    /// 请求附言
    pub message: Option<String>,
    /// 分类标签
    pub kind: Option<RequestKind>,
    /// 当前状态
    pub status: ChatRequestStatus,
    /// 负责审核的管理员ID（进入审核后有且仅有一位）
    pub verifying_admin_id: Option<UserId>,
    /// 延迟解析的目标用户ID（宠物联系人暂时无法解析时记录）
    pub deferred_target_id: Option<UserId>,
    /// 管理员可见备注
    pub admin_note: Option<String>,
    /// 审核房间ID（管理员 ↔ 请求者）
    pub verification_room_id: Option<RoomId>,
    /// 最终房间ID（审核完成后与审核房间为同一房间）
    pub final_room_id: Option<RoomId>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 管理员批准时间
    pub admin_approved_at: Option<DateTime<Utc>>,
    /// 目标用户接受时间
    pub user_accepted_at: Option<DateTime<Utc>>,
}

impl ChatRequest {
    /// 创建新的聊天请求
    ///
    /// 目标用户和宠物至少提供其一；指定自己为目标会被拒绝。
    pub fn new(
        requester_id: UserId,
        target_id: Option<UserId>,
        pet_id: Option<i64>,
        message: Option<String>,
        kind: Option<RequestKind>,
    ) -> DomainResult<Self> {
        if target_id.is_none() && pet_id.is_none() {
            return Err(DomainError::validation_error(
                "target_id",
                "必须提供目标用户或宠物",
            ));
        }

        if target_id == Some(requester_id) {
            return Err(DomainError::validation_error(
                "target_id",
                "不能向自己发起聊天请求",
            ));
        }

        let message = message.filter(|m| !m.trim().is_empty());

        Ok(Self {
            id: 0,
            requester_id,
            target_id,
            pet_id,
            message,
            kind,
            status: ChatRequestStatus::Pending,
            verifying_admin_id: None,
            deferred_target_id: None,
            admin_note: None,
            verification_room_id: None,
            final_room_id: None,
            created_at: Utc::now(),
            admin_approved_at: None,
            user_accepted_at: None,
        })
    }

    /// 记录暂时无法解析的目标用户ID
    ///
    /// 宠物的登记联系人在用户目录中不存在时调用；意向ID同时写入
    /// 管理员备注，供人工排查。
    pub fn defer_target(&mut self, intended_id: UserId) {
        self.deferred_target_id = Some(intended_id);
        self.admin_note = Some(format!("宠物联系人用户 {} 不存在，待管理员解析", intended_id));
    }

    /// 进入管理员审核阶段
    pub fn start_verification(&mut self, admin_id: UserId, room_id: RoomId) -> DomainResult<()> {
        if self.status != ChatRequestStatus::Pending {
            return Err(DomainError::conflict_with_status(
                "只有待处理的请求才能进入审核",
                self.status.as_str(),
            ));
        }

        self.status = ChatRequestStatus::AdminVerifying;
        self.verifying_admin_id = Some(admin_id);
        self.verification_room_id = Some(room_id);
        Ok(())
    }

    /// 完成审核，请求生效
    ///
    /// 审核房间即最终房间；房间身份在整个流程中保持不变。
    pub fn complete_verification(
        &mut self,
        admin_id: UserId,
        target_id: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != ChatRequestStatus::AdminVerifying {
            return Err(DomainError::conflict_with_status(
                "只有审核中的请求才能完成审核",
                self.status.as_str(),
            ));
        }

        if self.verifying_admin_id != Some(admin_id) {
            return Err(DomainError::permission_denied(
                "只有负责审核的管理员才能完成审核",
            ));
        }

        self.target_id = Some(target_id);
        self.final_room_id = self.verification_room_id;
        self.status = ChatRequestStatus::Active;
        self.admin_approved_at = Some(now);
        Ok(())
    }

    /// 管理员拒绝请求
    pub fn reject(&mut self, notes: Option<String>) -> DomainResult<()> {
        if self.status != ChatRequestStatus::Pending {
            return Err(DomainError::conflict_with_status(
                "只有待处理的请求才能被拒绝",
                self.status.as_str(),
            ));
        }

        self.status = ChatRequestStatus::Rejected;
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            self.admin_note = Some(notes);
        }
        Ok(())
    }

    /// 目标用户答复（遗留的 admin_approved 路径）
    pub fn accept(
        &mut self,
        user_id: UserId,
        approved: bool,
        room_id: RoomId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != ChatRequestStatus::AdminApproved {
            return Err(DomainError::conflict_with_status(
                "只有管理员批准后的请求才能由目标用户答复",
                self.status.as_str(),
            ));
        }

        if self.target_id != Some(user_id) {
            return Err(DomainError::permission_denied("只有请求目标才能答复请求"));
        }

        if approved {
            self.final_room_id = Some(room_id);
            self.status = ChatRequestStatus::Active;
            self.user_accepted_at = Some(now);
        } else {
            self.status = ChatRequestStatus::Rejected;
        }
        Ok(())
    }

    /// 按优先级给出可用于解析目标的候选用户ID
    ///
    /// 顺序：管理员显式提供 > 请求自身的目标字段 > 延迟解析记录。
    pub fn resolution_candidate(&self, explicit: Option<UserId>) -> Option<UserId> {
        explicit.or(self.target_id).or(self.deferred_target_id)
    }

    /// 检查请求是否仍占用 (requester, target) 配对
    ///
    /// 除被拒绝外的所有状态都视为占用，同一配对同时只允许一个。
    pub fn is_open(&self) -> bool {
        self.status != ChatRequestStatus::Rejected
    }

    /// 检查请求是否已到终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ChatRequestStatus::Active | ChatRequestStatus::Rejected
        )
    }
}
