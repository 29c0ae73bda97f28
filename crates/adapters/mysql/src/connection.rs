//! MySQL 连接管理

use std::str::FromStr;

use nobal_common::retry_when;
use nobal_errors::{AppError, AppResult};
use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::info;

use crate::config::MySqlConfig;
use crate::retry::is_sqlx_retryable;

/// 创建 MySQL 连接池，临时性错误按配置重试
pub async fn create_pool(config: &MySqlConfig) -> AppResult<MySqlPool> {
    let url = config.connection_url()?;
    let options = MySqlConnectOptions::from_str(url.expose_secret())
        .map_err(|e| AppError::configuration(format!("Invalid MySQL options: {}", e)))?;
    let policy = config.retry_policy();

    let pool = retry_when(
        &policy,
        "mysql.connect",
        || {
            MySqlPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.connect_timeout)
                .connect_with(options.clone())
        },
        is_sqlx_retryable,
    )
    .await
    .map_err(|e| {
        AppError::database(format!(
            "Failed to connect to {}: {}",
            config.display_target(),
            e
        ))
    })?;

    info!(target_db = %config.display_target(), "MySQL pool created");
    Ok(pool)
}

/// 服务器版本
pub async fn server_version(pool: &MySqlPool) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT CAST(VERSION() AS CHAR)")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query server version: {}", e)))
}

/// 当前选中的数据库
pub async fn current_database(pool: &MySqlPool) -> AppResult<Option<String>> {
    sqlx::query_scalar::<_, Option<String>>("SELECT CAST(DATABASE() AS CHAR)")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to query current database: {}", e)))
}
