//! 业务服务实现

pub mod chat_request_service;
pub mod message_service;
pub mod room_service;

pub use chat_request_service::{
    ChatRequestService, ChatRequestServiceDependencies, CreateRequestCommand,
};
pub use message_service::{MessageService, MessageServiceDependencies, SendMessageCommand};
pub use room_service::RoomService;

#[cfg(test)]
mod chat_request_service_tests;
#[cfg(test)]
mod message_service_tests;
