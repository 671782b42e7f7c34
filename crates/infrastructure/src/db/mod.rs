//! 数据库连接与仓储实现

use config::DatabaseConfig;
use domain::errors::DomainError;
use sqlx::migrate::Migrator;
use sqlx::{Pool, Postgres};

pub mod repositories;

pub type DbPool = Pool<Postgres>;

/// 内嵌的数据库迁移
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// 按配置创建连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

/// 把数据库错误映射为领域错误
///
/// 唯一约束冲突（23505）是并发收敛协议的一部分，调用方依赖
/// 冲突错误触发按键重查；其余错误归为存储故障。
pub(crate) fn map_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return DomainError::conflict(format!("唯一约束冲突: {}", db_err.message()));
        }
    }
    DomainError::storage(err.to_string())
}
