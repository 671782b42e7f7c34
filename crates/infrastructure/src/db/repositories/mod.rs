//! 仓储的 PostgreSQL 实现

pub mod chat_request_repository_impl;
pub mod chat_room_repository_impl;
pub mod message_repository_impl;

pub use chat_request_repository_impl::PgChatRequestRepository;
pub use chat_room_repository_impl::PgChatRoomRepository;
pub use message_repository_impl::PgMessageRepository;
