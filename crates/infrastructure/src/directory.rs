//! 用户目录与宠物目录的数据库实现
//!
//! 直接查询主站的用户表和宠物表。查询失败一律映射为暂时性
//! 故障，确定不存在才返回 `Ok(None)`。

use crate::db::DbPool;
use application::{DirectoryError, PetDirectory, UserDirectory, UserProfile};
use async_trait::async_trait;
use domain::entities::UserId;
use sqlx::query_as;
use std::sync::Arc;

#[derive(Debug, sqlx::FromRow)]
struct DbUserProfile {
    id: i64,
    name: String,
    email: String,
}

pub struct PgUserDirectory {
    pool: Arc<DbPool>,
}

impl PgUserDirectory {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_user(&self, id: UserId) -> Result<Option<UserProfile>, DirectoryError> {
        let row = query_as::<_, DbUserProfile>(
            "SELECT id, name, email FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| DirectoryError::unavailable(e.to_string()))?;

        Ok(row.map(|u| UserProfile {
            id: u.id,
            name: u.name,
            email: u.email,
        }))
    }
}

pub struct PgPetDirectory {
    pool: Arc<DbPool>,
}

impl PgPetDirectory {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PetDirectory for PgPetDirectory {
    async fn get_pet_contact(&self, pet_id: i64) -> Result<Option<UserId>, DirectoryError> {
        let contact: Option<(Option<i64>,)> =
            query_as("SELECT posted_by FROM pets WHERE id = $1")
                .bind(pet_id)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| DirectoryError::unavailable(e.to_string()))?;

        // 外层 None 表示宠物不存在，内层 None 表示没有登记联系人
        Ok(contact.and_then(|(posted_by,)| posted_by))
    }
}
