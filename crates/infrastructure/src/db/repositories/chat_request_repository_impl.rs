//! 聊天请求Repository实现

use crate::db::{map_db_error, DbPool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    entities::{ChatRequest, ChatRequestStatus, RequestId, RequestKind, UserId},
    errors::{DomainError, DomainResult},
    repositories::ChatRequestRepository,
};
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;

const REQUEST_COLUMNS: &str = "id, requester_id, target_id, pet_id, message, kind, status, \
     verifying_admin_id, deferred_target_id, admin_note, verification_room_id, final_room_id, \
     created_at, admin_approved_at, user_accepted_at";

/// 数据库聊天请求模型
#[derive(Debug, Clone, FromRow)]
struct DbChatRequest {
    pub id: i64,
    pub requester_id: i64,
    pub target_id: Option<i64>,
    pub pet_id: Option<i64>,
    pub message: Option<String>,
    pub kind: Option<String>,
    pub status: String,
    pub verifying_admin_id: Option<i64>,
    pub deferred_target_id: Option<i64>,
    pub admin_note: Option<String>,
    pub verification_room_id: Option<i64>,
    pub final_room_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub admin_approved_at: Option<DateTime<Utc>>,
    pub user_accepted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbChatRequest> for ChatRequest {
    type Error = DomainError;

    fn try_from(row: DbChatRequest) -> DomainResult<Self> {
        Ok(ChatRequest {
            id: row.id,
            requester_id: row.requester_id,
            target_id: row.target_id,
            pet_id: row.pet_id,
            message: row.message,
            kind: row.kind.as_deref().map(RequestKind::parse).transpose()?,
            status: ChatRequestStatus::parse(&row.status)?,
            verifying_admin_id: row.verifying_admin_id,
            deferred_target_id: row.deferred_target_id,
            admin_note: row.admin_note,
            verification_room_id: row.verification_room_id,
            final_room_id: row.final_room_id,
            created_at: row.created_at,
            admin_approved_at: row.admin_approved_at,
            user_accepted_at: row.user_accepted_at,
        })
    }
}

/// 聊天请求Repository实现
pub struct PgChatRequestRepository {
    pool: Arc<DbPool>,
}

impl PgChatRequestRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRequestRepository for PgChatRequestRepository {
    async fn create(&self, request: &ChatRequest) -> DomainResult<ChatRequest> {
        let row = query_as::<_, DbChatRequest>(&format!(
            r#"
            INSERT INTO chat_requests
                (requester_id, target_id, pet_id, message, kind, status,
                 deferred_target_id, admin_note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(request.requester_id)
        .bind(request.target_id)
        .bind(request.pet_id)
        .bind(&request.message)
        .bind(request.kind.map(|k| k.as_str()))
        .bind(request.status.as_str())
        .bind(request.deferred_target_id)
        .bind(&request.admin_note)
        .bind(request.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_db_error)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: RequestId) -> DomainResult<Option<ChatRequest>> {
        let row = query_as::<_, DbChatRequest>(&format!(
            "SELECT {} FROM chat_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_open_by_pair(
        &self,
        requester_id: UserId,
        target_id: UserId,
    ) -> DomainResult<Option<ChatRequest>> {
        let row = query_as::<_, DbChatRequest>(&format!(
            r#"
            SELECT {} FROM chat_requests
            WHERE requester_id = $1 AND target_id = $2 AND status <> 'rejected'
            "#,
            REQUEST_COLUMNS
        ))
        .bind(requester_id)
        .bind(target_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_guarded(
        &self,
        request: &ChatRequest,
        expected_status: ChatRequestStatus,
    ) -> DomainResult<bool> {
        let result = query(
            r#"
            UPDATE chat_requests
            SET target_id = $1, status = $2, verifying_admin_id = $3,
                deferred_target_id = $4, admin_note = $5, verification_room_id = $6,
                final_room_id = $7, admin_approved_at = $8, user_accepted_at = $9
            WHERE id = $10 AND status = $11
            "#,
        )
        .bind(request.target_id)
        .bind(request.status.as_str())
        .bind(request.verifying_admin_id)
        .bind(request.deferred_target_id)
        .bind(&request.admin_note)
        .bind(request.verification_room_id)
        .bind(request.final_room_id)
        .bind(request.admin_approved_at)
        .bind(request.user_accepted_at)
        .bind(request.id)
        .bind(expected_status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // 区分「状态检查失败」与「行不存在」
        let exists: Option<(i64,)> = query_as("SELECT id FROM chat_requests WHERE id = $1")
            .bind(request.id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(map_db_error)?;
        match exists {
            Some(_) => Ok(false),
            None => Err(DomainError::not_found("chat_request", request.id)),
        }
    }

    async fn list_by_status(&self, status: ChatRequestStatus) -> DomainResult<Vec<ChatRequest>> {
        let rows = query_as::<_, DbChatRequest>(&format!(
            "SELECT {} FROM chat_requests WHERE status = $1 ORDER BY id",
            REQUEST_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_user(&self, user_id: UserId) -> DomainResult<Vec<ChatRequest>> {
        let rows = query_as::<_, DbChatRequest>(&format!(
            r#"
            SELECT {} FROM chat_requests
            WHERE requester_id = $1 OR target_id = $1
            ORDER BY id
            "#,
            REQUEST_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
