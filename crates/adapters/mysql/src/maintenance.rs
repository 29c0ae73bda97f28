//! 运维操作：清空表

use nobal_common::{quote_identifier, validate_identifier};
use nobal_errors::{AppError, AppResult};
use serde::Serialize;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct TruncatedTable {
    pub table: String,
    pub rows_before: i64,
}

/// 校验待清空的表名，台账表不允许清空
pub fn check_truncate_targets(tables: &[String], ledger_table: &str) -> AppResult<()> {
    if tables.is_empty() {
        return Err(AppError::validation("no tables given"));
    }
    for table in tables {
        validate_identifier(table)?;
        if table.eq_ignore_ascii_case(ledger_table) {
            return Err(AppError::validation(format!(
                "refusing to truncate the migration ledger `{}`",
                ledger_table
            )));
        }
    }
    Ok(())
}

/// 关闭外键检查后依次清空表
///
/// 同一个会话内执行，结束后（包括失败时）恢复外键检查
pub async fn truncate_tables(
    pool: &MySqlPool,
    tables: &[String],
    ledger_table: &str,
) -> AppResult<Vec<TruncatedTable>> {
    check_truncate_targets(tables, ledger_table)?;

    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| AppError::database(format!("Failed to acquire connection: {}", e)))?;

    for table in tables {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
        )
        .bind(table)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to check table: {}", e)))?;
        if count == 0 {
            return Err(AppError::not_found(format!("table `{}` does not exist", table)));
        }
    }

    set_foreign_key_checks(&mut conn, false).await?;
    let result = truncate_each(&mut conn, tables).await;
    if let Err(e) = set_foreign_key_checks(&mut conn, true).await {
        warn!(error = %e, "Failed to restore FOREIGN_KEY_CHECKS, closing connection");
        // 会话状态不确定，不能归还连接池
        conn.detach();
        return Err(e);
    }
    result
}

async fn set_foreign_key_checks(conn: &mut MySqlConnection, enabled: bool) -> AppResult<()> {
    let sql = if enabled {
        "SET FOREIGN_KEY_CHECKS = 1"
    } else {
        "SET FOREIGN_KEY_CHECKS = 0"
    };
    sqlx::raw_sql(sql)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("{} failed: {}", sql, e)))?;
    Ok(())
}

async fn truncate_each(
    conn: &mut MySqlConnection,
    tables: &[String],
) -> AppResult<Vec<TruncatedTable>> {
    let mut truncated = Vec::with_capacity(tables.len());
    for table in tables {
        let quoted = quote_identifier(table);
        let rows_before: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quoted))
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to count `{}`: {}", table, e)))?;

        sqlx::raw_sql(&format!("TRUNCATE TABLE {}", quoted))
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::database(format!("Failed to truncate `{}`: {}", table, e)))?;

        info!(table = %table, rows_before, "Table truncated");
        truncated.push(TruncatedTable {
            table: table.clone(),
            rows_before,
        });
    }
    Ok(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_truncate_targets() {
        let ok = vec!["stock_entry_items".to_string(), "stock_ledger".to_string()];
        assert!(check_truncate_targets(&ok, "_schema_migrations").is_ok());

        let ledger = vec!["_SCHEMA_MIGRATIONS".to_string()];
        assert!(check_truncate_targets(&ledger, "_schema_migrations").is_err());

        let injected = vec!["item`; DROP TABLE bom; --".to_string()];
        assert!(check_truncate_targets(&injected, "_schema_migrations").is_err());

        assert!(check_truncate_targets(&[], "_schema_migrations").is_err());
    }
}
