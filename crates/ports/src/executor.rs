//! 语句执行 trait 定义

use async_trait::async_trait;
use derive_more::Display;
use thiserror::Error;

/// 执行错误分类
///
/// 迁移引擎根据分类决定：视为已存在、降级，还是失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExecErrorKind {
    /// 列已存在
    #[display("duplicate_column")]
    DuplicateColumn,
    /// 索引名已存在
    #[display("duplicate_key")]
    DuplicateKey,
    /// 表已存在
    #[display("table_exists")]
    TableExists,
    /// 外键约束名已存在
    #[display("duplicate_foreign_key")]
    DuplicateForeignKey,
    /// 要删除的列、索引或约束不存在
    #[display("missing_object")]
    MissingObject,
    /// 外键引用的父表不存在
    #[display("missing_referenced_table")]
    MissingReferencedTable,
    /// 目标表不存在
    #[display("missing_table")]
    MissingTable,
    /// 连接层错误
    #[display("connection")]
    Connection,
    #[display("other")]
    Other,
}

impl ExecErrorKind {
    /// 重复对象类错误，重跑迁移时出现属于正常情况
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::DuplicateColumn | Self::DuplicateKey | Self::TableExists | Self::DuplicateForeignKey
        )
    }
}

/// 语句执行错误
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExecError {
    pub kind: ExecErrorKind,
    /// 数据库错误号（MySQL error number）
    pub code: Option<u16>,
    pub message: String,
}

impl ExecError {
    pub fn new(kind: ExecErrorKind, code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ExecErrorKind::Other, None, message)
    }
}

/// 语句执行器
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// 执行一条语句，返回影响行数
    async fn execute(&self, statement: &str) -> Result<u64, ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(ExecErrorKind::DuplicateForeignKey.to_string(), "duplicate_foreign_key");
        assert_eq!(ExecErrorKind::MissingReferencedTable.to_string(), "missing_referenced_table");
        assert!(ExecErrorKind::TableExists.is_duplicate());
        assert!(!ExecErrorKind::MissingObject.is_duplicate());
    }
}
