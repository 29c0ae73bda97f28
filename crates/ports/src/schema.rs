//! Schema 查询 trait 定义

use async_trait::async_trait;
use nobal_errors::AppResult;
use serde::Serialize;

/// 列信息（来自 `INFORMATION_SCHEMA.COLUMNS`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// 完整列类型，例如 `varchar(50)`、`enum('draft','pending')`
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// 当前数据库 schema 的只读视图
#[async_trait]
pub trait SchemaInspector: Send + Sync {
    /// 表是否存在
    async fn table_exists(&self, table: &str) -> AppResult<bool>;

    /// 查询列，不存在时返回 None
    async fn column(&self, table: &str, column: &str) -> AppResult<Option<ColumnInfo>>;

    /// 索引是否存在
    async fn index_exists(&self, table: &str, index: &str) -> AppResult<bool>;

    /// 外键约束是否存在
    async fn foreign_key_exists(&self, table: &str, constraint: &str) -> AppResult<bool>;
}
