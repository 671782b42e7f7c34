//! 宠物寻回平台聊天核心的领域模型
//!
//! 包含聊天请求、聊天房间、消息等核心实体，以及相关的业务规则
//! 和数据访问接口定义。

pub mod entities;
pub mod errors;
pub mod events;
pub mod repositories;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use repositories::*;
