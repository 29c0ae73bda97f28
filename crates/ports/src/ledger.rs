//! 迁移台账 trait 定义

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nobal_errors::AppResult;
use serde::Serialize;

/// 已应用的迁移记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    /// SHA-256 十六进制
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    pub execution_ms: i64,
    /// 通过 baseline 登记，未实际执行
    pub baseline: bool,
}

/// 只进不退的迁移台账
#[async_trait]
pub trait MigrationLedger: Send + Sync {
    /// 创建台账表（幂等）
    async fn init(&self) -> AppResult<()>;

    /// 台账表是否存在
    async fn exists(&self) -> AppResult<bool>;

    /// 按版本升序返回已应用的迁移
    async fn applied(&self) -> AppResult<Vec<AppliedMigration>>;

    /// 在事务中登记一条迁移，版本已存在时返回 Conflict
    async fn record(&self, entry: &AppliedMigration) -> AppResult<()>;

    /// 覆盖已登记迁移的校验和
    async fn update_checksum(&self, version: i64, checksum: &str) -> AppResult<()>;
}
