//! nobal-errors - 统一错误处理
//!
//! 所有 crate 共用的错误类型，命令行入口通过 `exit_code` 决定进程退出码

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 错误类别（日志和 JSON 输出使用）
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
            Self::Database(_) => "database",
            Self::ExternalService(_) => "external_service",
            Self::FailedPrecondition(_) => "failed_precondition",
            Self::Configuration(_) => "configuration",
        }
    }

    /// 转换为进程退出码（sysexits 约定）
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 65,
            Self::NotFound(_) => 66,
            Self::ExternalService(_) => 69,
            Self::Internal(_) => 70,
            Self::Database(_) => 74,
            Self::Conflict(_) => 75,
            Self::FailedPrecondition(_) => 76,
            Self::Configuration(_) => 78,
        }
    }

    /// 转换为错误报告
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind().to_string(),
            exit_code: self.exit_code(),
            detail: self.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization failed: {}", err))
    }
}

/// 机器可读的错误报告（`--json` 输出）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: String,
    pub exit_code: u8,
    pub detail: String,
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            AppError::not_found("x"),
            AppError::validation("x"),
            AppError::conflict("x"),
            AppError::internal("x"),
            AppError::database("x"),
            AppError::external_service("x"),
            AppError::failed_precondition("x"),
            AppError::configuration("x"),
        ];

        let mut codes: Vec<u8> = errors.iter().map(AppError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn test_error_report() {
        let report = AppError::conflict("migration lock is held").to_report();
        assert_eq!(report.kind, "conflict");
        assert_eq!(report.exit_code, 75);
        assert_eq!(report.detail, "Conflict: migration lock is held");
    }
}
