//! 聊天房间Repository实现
//!
//! 房间行与成员行分表存储。规范键和产生请求的唯一性由数据库
//! 约束保证，成员加入用 ON CONFLICT DO NOTHING 实现幂等。

use crate::db::{map_db_error, DbPool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    entities::{ChatRoom, RequestId, RoomId, UserId},
    errors::{DomainError, DomainResult},
    repositories::ChatRoomRepository,
};
use sqlx::{query, query_as, query_scalar, FromRow};
use std::collections::HashMap;
use std::sync::Arc;

const ROOM_COLUMNS: &str =
    "id, room_key, is_active, producing_request_id, created_at, updated_at";

/// 数据库房间模型（不含成员）
#[derive(Debug, Clone, FromRow)]
struct DbChatRoom {
    pub id: i64,
    pub room_key: Option<String>,
    pub is_active: bool,
    pub producing_request_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbChatRoom {
    fn into_room(self, member_ids: Vec<UserId>) -> ChatRoom {
        ChatRoom {
            id: self.id,
            room_key: self.room_key,
            member_ids,
            is_active: self.is_active,
            producing_request_id: self.producing_request_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// 聊天房间Repository实现
pub struct PgChatRoomRepository {
    pool: Arc<DbPool>,
}

impl PgChatRoomRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    async fn load_members(&self, room_id: RoomId) -> DomainResult<Vec<UserId>> {
        query_scalar::<_, i64>(
            "SELECT user_id FROM room_members WHERE room_id = $1 ORDER BY joined_at, user_id",
        )
        .bind(room_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn hydrate(&self, row: Option<DbChatRoom>) -> DomainResult<Option<ChatRoom>> {
        match row {
            None => Ok(None),
            Some(row) => {
                let members = self.load_members(row.id).await?;
                Ok(Some(row.into_room(members)))
            }
        }
    }
}

#[async_trait]
impl ChatRoomRepository for PgChatRoomRepository {
    async fn create(&self, room: &ChatRoom) -> DomainResult<ChatRoom> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let row = query_as::<_, DbChatRoom>(&format!(
            r#"
            INSERT INTO chat_rooms (room_key, is_active, producing_request_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ROOM_COLUMNS
        ))
        .bind(&room.room_key)
        .bind(room.is_active)
        .bind(room.producing_request_id)
        .bind(room.created_at)
        .bind(room.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        for member_id in room.member_ids.iter().copied() {
            query("INSERT INTO room_members (room_id, user_id) VALUES ($1, $2)")
                .bind(row.id)
                .bind(member_id)
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(row.into_room(room.member_ids.clone()))
    }

    async fn find_by_id(&self, id: RoomId) -> DomainResult<Option<ChatRoom>> {
        let row = query_as::<_, DbChatRoom>(&format!(
            "SELECT {} FROM chat_rooms WHERE id = $1",
            ROOM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_error)?;

        self.hydrate(row).await
    }

    async fn find_by_key(&self, key: &str) -> DomainResult<Option<ChatRoom>> {
        let row = query_as::<_, DbChatRoom>(&format!(
            "SELECT {} FROM chat_rooms WHERE room_key = $1",
            ROOM_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_error)?;

        self.hydrate(row).await
    }

    async fn find_by_producing_request(
        &self,
        request_id: RequestId,
    ) -> DomainResult<Option<ChatRoom>> {
        let row = query_as::<_, DbChatRoom>(&format!(
            "SELECT {} FROM chat_rooms WHERE producing_request_id = $1",
            ROOM_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_error)?;

        self.hydrate(row).await
    }

    async fn add_member(&self, room_id: RoomId, user_id: UserId) -> DomainResult<()> {
        let result = query(
            r#"
            INSERT INTO room_members (room_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23503") => {
                Err(DomainError::not_found("chat_room", room_id))
            }
            Err(err) => Err(map_db_error(err)),
        }
    }

    async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> DomainResult<()> {
        query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&*self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn assign_key_if_absent(&self, room_id: RoomId, key: &str) -> DomainResult<String> {
        query(
            r#"
            UPDATE chat_rooms SET room_key = $2, updated_at = NOW()
            WHERE id = $1 AND room_key IS NULL
            "#,
        )
        .bind(room_id)
        .bind(key)
        .execute(&*self.pool)
        .await
        .map_err(map_db_error)?;

        // 返回存储中实际生效的键（可能是早先绑定的）
        let effective: Option<Option<String>> =
            query_scalar("SELECT room_key FROM chat_rooms WHERE id = $1")
                .bind(room_id)
                .fetch_optional(&*self.pool)
                .await
                .map_err(map_db_error)?;

        effective
            .ok_or_else(|| DomainError::not_found("chat_room", room_id))?
            .ok_or_else(|| DomainError::storage("房间键写入后读取为空"))
    }

    async fn close(&self, room_id: RoomId) -> DomainResult<()> {
        let result = query("UPDATE chat_rooms SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(room_id)
            .execute(&*self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("chat_room", room_id));
        }
        Ok(())
    }

    async fn touch(&self, room_id: RoomId, at: DateTime<Utc>) -> DomainResult<()> {
        query("UPDATE chat_rooms SET updated_at = GREATEST(updated_at, $2) WHERE id = $1")
            .bind(room_id)
            .bind(at)
            .execute(&*self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn list_for_member(&self, user_id: UserId) -> DomainResult<Vec<ChatRoom>> {
        let rows = query_as::<_, DbChatRoom>(
            r#"
            SELECT r.id, r.room_key, r.is_active, r.producing_request_id,
                   r.created_at, r.updated_at
            FROM chat_rooms r
            JOIN room_members m ON m.room_id = r.id
            WHERE m.user_id = $1
            ORDER BY r.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_db_error)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // 批量装载全部成员，避免逐房间查询
        let room_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let member_rows: Vec<(i64, i64)> = query_as(
            r#"
            SELECT room_id, user_id FROM room_members
            WHERE room_id = ANY($1)
            ORDER BY joined_at, user_id
            "#,
        )
        .bind(&room_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_db_error)?;

        let mut members: HashMap<i64, Vec<UserId>> = HashMap::new();
        for (room_id, member_id) in member_rows {
            members.entry(room_id).or_default().push(member_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let room_members = members.remove(&row.id).unwrap_or_default();
                row.into_room(room_members)
            })
            .collect())
    }
}
