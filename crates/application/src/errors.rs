//! 应用层错误类型

use crate::directory::DirectoryError;
use domain::errors::DomainError;

/// 应用层统一错误
///
/// 领域错误原样向上传递，目录服务的暂时性故障单独成类，
/// 调用方据此区分「确定失败」与「稍后重试」。
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("基础设施错误: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure(message.into())
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
