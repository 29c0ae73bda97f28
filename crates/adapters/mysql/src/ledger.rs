//! MySQL 迁移台账

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nobal_common::{quote_identifier, validate_identifier};
use nobal_errors::{AppError, AppResult};
use nobal_ports::{AppliedMigration, MigrationLedger};
use sqlx::MySqlPool;
use tracing::info;

/// 台账表，每个已应用的迁移一行
pub struct MySqlLedger {
    pool: MySqlPool,
    table: String,
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    version: i64,
    name: String,
    checksum: String,
    applied_at: DateTime<Utc>,
    execution_ms: i64,
    baseline: bool,
}

impl From<LedgerRow> for AppliedMigration {
    fn from(row: LedgerRow) -> Self {
        Self {
            version: row.version,
            name: row.name,
            checksum: row.checksum,
            applied_at: row.applied_at,
            execution_ms: row.execution_ms,
            baseline: row.baseline,
        }
    }
}

impl MySqlLedger {
    pub fn new(pool: MySqlPool, table: impl Into<String>) -> AppResult<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { pool, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted(&self) -> String {
        quote_identifier(&self.table)
    }

    /// 建表语句
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n\
             \x20 version BIGINT NOT NULL,\n\
             \x20 name VARCHAR(255) NOT NULL,\n\
             \x20 checksum CHAR(64) NOT NULL,\n\
             \x20 applied_at TIMESTAMP(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),\n\
             \x20 execution_ms BIGINT NOT NULL DEFAULT 0,\n\
             \x20 baseline TINYINT(1) NOT NULL DEFAULT 0,\n\
             \x20 PRIMARY KEY (version)\n\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            self.quoted()
        )
    }
}

#[async_trait]
impl MigrationLedger for MySqlLedger {
    async fn init(&self) -> AppResult<()> {
        sqlx::raw_sql(&self.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create migration table: {}", e)))?;

        info!(table = %self.table, "Migration table initialized");
        Ok(())
    }

    async fn exists(&self) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
        )
        .bind(&self.table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check migration table: {}", e)))?;
        Ok(count > 0)
    }

    async fn applied(&self) -> AppResult<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT version, CAST(name AS CHAR) AS name, CAST(checksum AS CHAR) AS checksum, \
                    applied_at, execution_ms, baseline \
             FROM {} ORDER BY version ASC",
            self.quoted()
        );

        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get migrations: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record(&self, entry: &AppliedMigration) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        let existing: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE version = ? FOR UPDATE",
            self.quoted()
        ))
        .bind(entry.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to check migration: {}", e)))?;
        if existing > 0 {
            return Err(AppError::conflict(format!(
                "migration {} is already recorded",
                entry.version
            )));
        }

        sqlx::query(&format!(
            "INSERT INTO {} (version, name, checksum, applied_at, execution_ms, baseline) \
             VALUES (?, ?, ?, ?, ?, ?)",
            self.quoted()
        ))
        .bind(entry.version)
        .bind(&entry.name)
        .bind(&entry.checksum)
        .bind(entry.applied_at)
        .bind(entry.execution_ms)
        .bind(entry.baseline)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to record migration: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit migration record: {}", e)))?;

        info!(version = entry.version, name = %entry.name, "Migration recorded");
        Ok(())
    }

    async fn update_checksum(&self, version: i64, checksum: &str) -> AppResult<()> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET checksum = ? WHERE version = ?",
            self.quoted()
        ))
        .bind(checksum)
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update checksum: {}", e)))?;

        if result.rows_affected() == 0 {
            // MySQL 对值未变化的行也报告 0，这里再确认一次版本是否存在
            let count: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM {} WHERE version = ?",
                self.quoted()
            ))
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to check migration: {}", e)))?;
            if count == 0 {
                return Err(AppError::not_found(format!(
                    "migration {} is not recorded",
                    version
                )));
            }
        }
        Ok(())
    }
}
