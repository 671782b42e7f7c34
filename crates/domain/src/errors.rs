//! 领域模型错误定义
//!
//! 定义聊天核心中所有可恢复的错误类型。每个变体对应一类调用方
//! 可以据此重试或修正的失败。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 资源不存在错误
    #[error("资源不存在: {resource_type} {resource_id}")]
    NotFound {
        resource_type: String,
        resource_id: String,
    },

    /// 状态冲突错误（从错误的状态发起迁移、重复创建等）
    ///
    /// `current_status` 携带实体当前的真实状态，供调用方做乐观 UI 回滚。
    #[error("状态冲突: {message}")]
    Conflict {
        message: String,
        current_status: Option<String>,
    },

    /// 权限错误
    #[error("权限不足: {action}")]
    PermissionDenied { action: String },

    /// 验证错误
    #[error("验证失败: {field}: {message}")]
    Validation { field: String, message: String },

    /// 引用无法解析错误（审核完成时目标用户不存在）
    #[error("引用无法解析: {reference}")]
    UnresolvedReference { reference: String },

    /// 存储层错误（连接中断等约束之外的数据库故障）
    #[error("存储错误: {0}")]
    Storage(String),
}

impl DomainError {
    /// 创建资源不存在错误
    pub fn not_found(resource_type: impl Into<String>, resource_id: impl ToString) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            resource_id: resource_id.to_string(),
        }
    }

    /// 创建状态冲突错误
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            current_status: None,
        }
    }

    /// 创建携带当前状态的冲突错误
    pub fn conflict_with_status(
        message: impl Into<String>,
        current_status: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            message: message.into(),
            current_status: Some(current_status.into()),
        }
    }

    /// 创建权限错误
    pub fn permission_denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }

    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建引用无法解析错误
    pub fn unresolved_reference(reference: impl ToString) -> Self {
        Self::UnresolvedReference {
            reference: reference.to_string(),
        }
    }

    /// 创建存储层错误
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
