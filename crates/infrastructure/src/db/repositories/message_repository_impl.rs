//! 消息Repository实现
//!
//! 消息ID由 BIGSERIAL 分配，在房间内随创建顺序单调递增，
//! 轮询客户端以此为水位线做增量拉取。

use crate::db::{map_db_error, DbPool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    entities::{Message, MessageId, MessageKind, RoomId, UserId},
    errors::{DomainError, DomainResult},
    repositories::MessageRepository,
};
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;

const MESSAGE_COLUMNS: &str =
    "id, room_id, sender_id, kind, content, image_url, is_read, is_deleted, deleted_at, created_at";

/// 数据库消息模型
#[derive(Debug, Clone, FromRow)]
struct DbMessage {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub kind: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbMessage> for Message {
    type Error = DomainError;

    fn try_from(row: DbMessage) -> DomainResult<Self> {
        Ok(Message {
            id: row.id,
            room_id: row.room_id,
            sender_id: row.sender_id,
            kind: MessageKind::parse(&row.kind)?,
            content: row.content,
            image_url: row.image_url,
            is_read: row.is_read,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
        })
    }
}

/// 消息Repository实现
pub struct PgMessageRepository {
    pool: Arc<DbPool>,
}

impl PgMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, message: &Message) -> DomainResult<Message> {
        let row = query_as::<_, DbMessage>(&format!(
            r#"
            INSERT INTO messages
                (room_id, sender_id, kind, content, image_url, is_read, is_deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(message.room_id)
        .bind(message.sender_id)
        .bind(message.kind.as_str())
        .bind(&message.content)
        .bind(&message.image_url)
        .bind(message.is_read)
        .bind(message.is_deleted)
        .bind(message.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_db_error)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: MessageId) -> DomainResult<Option<Message>> {
        let row = query_as::<_, DbMessage>(&format!(
            "SELECT {} FROM messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_since(
        &self,
        room_id: RoomId,
        since_id: MessageId,
    ) -> DomainResult<Vec<Message>> {
        let rows = query_as::<_, DbMessage>(&format!(
            r#"
            SELECT {} FROM messages
            WHERE room_id = $1 AND id > $2
            ORDER BY id
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(room_id)
        .bind(since_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_read(&self, room_id: RoomId, reader_id: UserId) -> DomainResult<u64> {
        let result = query(
            r#"
            UPDATE messages SET is_read = TRUE
            WHERE room_id = $1 AND sender_id <> $2 AND is_read = FALSE
            "#,
        )
        .bind(room_id)
        .bind(reader_id)
        .execute(&*self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    async fn update(&self, message: &Message) -> DomainResult<()> {
        let result = query(
            r#"
            UPDATE messages
            SET content = $2, image_url = $3, is_read = $4, is_deleted = $5, deleted_at = $6
            WHERE id = $1
            "#,
        )
        .bind(message.id)
        .bind(&message.content)
        .bind(&message.image_url)
        .bind(message.is_read)
        .bind(message.is_deleted)
        .bind(message.deleted_at)
        .execute(&*self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("message", message.id));
        }
        Ok(())
    }
}
