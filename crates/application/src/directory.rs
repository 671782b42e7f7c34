//! 用户目录与宠物目录接口
//!
//! 聊天域不拥有用户和宠物数据，只通过这两个接口做存在性校验
//! 和联系人解析。`Ok(None)` 表示对象确定不存在，`Err` 表示目录
//! 服务暂时不可用，两者必须区分：前者拒绝请求，后者提示重试。

use async_trait::async_trait;
use domain::entities::UserId;

/// 用户摘要信息
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// 目录服务错误（暂时性故障）
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("目录服务暂时不可用: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// 用户目录
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<UserProfile>, DirectoryError>;
}

/// 宠物目录
///
/// 返回宠物登记的联系人用户ID（可能为空）。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PetDirectory: Send + Sync {
    async fn get_pet_contact(&self, pet_id: i64) -> Result<Option<UserId>, DirectoryError>;
}
