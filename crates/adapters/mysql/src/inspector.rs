//! INFORMATION_SCHEMA 查询
//!
//! MySQL 8 的 information_schema 列按二进制排序规则返回，
//! 所有文本列都先 `CAST(... AS CHAR)` 再解码为 `String`

use async_trait::async_trait;
use nobal_errors::{AppError, AppResult};
use nobal_ports::{ColumnInfo, SchemaInspector};
use serde::Serialize;
use sqlx::MySqlPool;

/// 表概况
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    /// InnoDB 的估算行数
    pub estimated_rows: Option<u64>,
    pub engine: Option<String>,
}

/// `inspect describe` 输出的列
#[derive(Debug, Clone, Serialize)]
pub struct ColumnDetail {
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// PRI / UNI / MUL
    pub key: String,
    pub extra: String,
}

/// 外键（每列一行）
#[derive(Debug, Clone, Serialize)]
pub struct ForeignKeyInfo {
    pub name: String,
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: String,
    pub on_update: String,
}

#[derive(Clone)]
pub struct MySqlSchemaInspector {
    pool: MySqlPool,
}

fn query_failed(what: &str, e: sqlx::Error) -> AppError {
    AppError::database(format!("Failed to query {}: {}", what, e))
}

impl MySqlSchemaInspector {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn count(&self, what: &str, sql: &str, args: &[&str]) -> AppResult<bool> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        for arg in args {
            query = query.bind(*arg);
        }
        let count = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_failed(what, e))?;
        Ok(count > 0)
    }

    /// 当前库的所有基表
    pub async fn list_tables(&self) -> AppResult<Vec<TableSummary>> {
        let rows: Vec<(String, Option<u64>, Option<String>)> = sqlx::query_as(
            "SELECT CAST(TABLE_NAME AS CHAR), CAST(TABLE_ROWS AS UNSIGNED), CAST(ENGINE AS CHAR) \
             FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("tables", e))?;

        Ok(rows
            .into_iter()
            .map(|(name, estimated_rows, engine)| TableSummary {
                name,
                estimated_rows,
                engine,
            })
            .collect())
    }

    /// 表的全部列，表不存在时返回 NotFound
    pub async fn describe_table(&self, table: &str) -> AppResult<Vec<ColumnDetail>> {
        if !self.table_exists(table).await? {
            return Err(AppError::not_found(format!("table `{}` does not exist", table)));
        }

        let rows: Vec<(String, String, String, Option<String>, String, String)> = sqlx::query_as(
            "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), \
                    CAST(COLUMN_DEFAULT AS CHAR), CAST(COLUMN_KEY AS CHAR), CAST(EXTRA AS CHAR) \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("columns", e))?;

        Ok(rows
            .into_iter()
            .map(|(name, column_type, nullable, default, key, extra)| ColumnDetail {
                name,
                column_type,
                nullable: nullable == "YES",
                default,
                key,
                extra,
            })
            .collect())
    }

    /// 表上的外键以及引用该表的外键
    pub async fn foreign_keys(&self, table: &str) -> AppResult<Vec<ForeignKeyInfo>> {
        if !self.table_exists(table).await? {
            return Err(AppError::not_found(format!("table `{}` does not exist", table)));
        }

        let rows: Vec<(String, String, String, String, String, String, String)> = sqlx::query_as(
            "SELECT CAST(k.CONSTRAINT_NAME AS CHAR), CAST(k.TABLE_NAME AS CHAR), CAST(k.COLUMN_NAME AS CHAR), \
                    CAST(k.REFERENCED_TABLE_NAME AS CHAR), CAST(k.REFERENCED_COLUMN_NAME AS CHAR), \
                    CAST(r.DELETE_RULE AS CHAR), CAST(r.UPDATE_RULE AS CHAR) \
             FROM information_schema.KEY_COLUMN_USAGE k \
             JOIN information_schema.REFERENTIAL_CONSTRAINTS r \
               ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
              AND r.TABLE_NAME = k.TABLE_NAME \
              AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
             WHERE k.TABLE_SCHEMA = DATABASE() \
               AND k.REFERENCED_TABLE_NAME IS NOT NULL \
               AND (k.TABLE_NAME = ? OR k.REFERENCED_TABLE_NAME = ?) \
             ORDER BY k.TABLE_NAME, k.CONSTRAINT_NAME, k.ORDINAL_POSITION",
        )
        .bind(table)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("foreign keys", e))?;

        Ok(rows
            .into_iter()
            .map(
                |(name, table, column, referenced_table, referenced_column, on_delete, on_update)| {
                    ForeignKeyInfo {
                        name,
                        table,
                        column,
                        referenced_table,
                        referenced_column,
                        on_delete,
                        on_update,
                    }
                },
            )
            .collect())
    }
}

#[async_trait]
impl SchemaInspector for MySqlSchemaInspector {
    async fn table_exists(&self, table: &str) -> AppResult<bool> {
        self.count(
            "table",
            "SELECT COUNT(*) FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
            &[table],
        )
        .await
    }

    async fn column(&self, table: &str, column: &str) -> AppResult<Option<ColumnInfo>> {
        let row: Option<(String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), \
                    CAST(COLUMN_DEFAULT AS CHAR) \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?",
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("column", e))?;

        Ok(row.map(|(name, column_type, nullable, default)| ColumnInfo {
            name,
            column_type,
            nullable: nullable == "YES",
            default,
        }))
    }

    async fn index_exists(&self, table: &str, index: &str) -> AppResult<bool> {
        self.count(
            "index",
            "SELECT COUNT(*) FROM information_schema.STATISTICS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME = ?",
            &[table, index],
        )
        .await
    }

    async fn foreign_key_exists(&self, table: &str, constraint: &str) -> AppResult<bool> {
        self.count(
            "foreign key",
            "SELECT COUNT(*) FROM information_schema.TABLE_CONSTRAINTS \
             WHERE CONSTRAINT_SCHEMA = DATABASE() AND TABLE_NAME = ? \
               AND CONSTRAINT_NAME = ? AND CONSTRAINT_TYPE = 'FOREIGN KEY'",
            &[table, constraint],
        )
        .await
    }
}
