//! 迁移锁 trait 定义

use std::time::Duration;

use async_trait::async_trait;
use nobal_errors::AppResult;

/// 同一数据库同一时间只允许一个迁移进程
#[async_trait]
pub trait MigrationLock: Send + Sync {
    /// 获取锁，超时返回 false
    async fn acquire(&self, timeout: Duration) -> AppResult<bool>;

    /// 释放锁（未持有时为空操作）
    async fn release(&self) -> AppResult<()>;

    /// 锁当前是否空闲
    async fn is_free(&self) -> AppResult<bool>;
}
