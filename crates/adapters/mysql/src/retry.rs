//! 重试判定
//!
//! 只有建立连接会重试，迁移语句失败一律不重试

use crate::error_code::mysql_error_number;

/// ER_CON_COUNT_ERROR
const ER_CON_COUNT: u16 = 1040;
/// ER_SERVER_SHUTDOWN
const ER_SERVER_SHUTDOWN: u16 = 1053;
/// ER_LOCK_WAIT_TIMEOUT
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// ER_LOCK_DEADLOCK
const ER_LOCK_DEADLOCK: u16 = 1213;

/// 判断错误信息是否像临时性故障
pub fn is_retryable_error(error: &str) -> bool {
    let retryable_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "timed out",
        "too many connections",
        "broken pipe",
        "no route to host",
        "server has gone away",
        "lost connection",
        "temporarily unavailable",
    ];

    let error_lower = error.to_lowercase();
    retryable_patterns
        .iter()
        .any(|pattern| error_lower.contains(pattern))
}

/// 判断 sqlx 错误是否可重试
pub fn is_sqlx_retryable(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) => true,
        sqlx::Error::Tls(_) => true,
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::PoolClosed => false,
        sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => match mysql_error_number(error) {
            Some(code) => matches!(
                code,
                ER_CON_COUNT | ER_SERVER_SHUTDOWN | ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK
            ),
            None => is_retryable_error(db_err.message()),
        },
        _ => is_retryable_error(&error.to_string()),
    }
}
