//! MySQL 命名锁
//!
//! `GET_LOCK` 绑定在会话上，持锁期间必须一直占用同一个连接，
//! 释放后连接才归还连接池

use std::time::Duration;

use async_trait::async_trait;
use nobal_errors::{AppError, AppResult};
use nobal_ports::MigrationLock;
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlPool};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct MySqlAdvisoryLock {
    pool: MySqlPool,
    name: String,
    held: Mutex<Option<PoolConnection<MySql>>>,
}

impl MySqlAdvisoryLock {
    pub fn new(pool: MySqlPool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
            held: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl MigrationLock for MySqlAdvisoryLock {
    async fn acquire(&self, timeout: Duration) -> AppResult<bool> {
        let mut held = self.held.lock().await;
        if held.is_some() {
            return Ok(true);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection for lock: {}", e)))?;

        // 1 获得，0 超时，NULL 出错
        let result: Option<i64> = sqlx::query_scalar("SELECT GET_LOCK(?, ?)")
            .bind(&self.name)
            .bind(i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX))
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("GET_LOCK failed: {}", e)))?;

        match result {
            Some(1) => {
                debug!(lock = %self.name, "Advisory lock acquired");
                *held = Some(conn);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppError::database(format!(
                "GET_LOCK('{}') returned NULL",
                self.name
            ))),
        }
    }

    async fn release(&self) -> AppResult<()> {
        let Some(mut conn) = self.held.lock().await.take() else {
            return Ok(());
        };

        let result: Option<i64> = sqlx::query_scalar("SELECT RELEASE_LOCK(?)")
            .bind(&self.name)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("RELEASE_LOCK failed: {}", e)))?;

        if result != Some(1) {
            warn!(lock = %self.name, result = ?result, "Lock was not held by this session");
        }
        debug!(lock = %self.name, "Advisory lock released");
        Ok(())
    }

    async fn is_free(&self) -> AppResult<bool> {
        let result: Option<i64> = sqlx::query_scalar("SELECT IS_FREE_LOCK(?)")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("IS_FREE_LOCK failed: {}", e)))?;
        Ok(result == Some(1))
    }
}
