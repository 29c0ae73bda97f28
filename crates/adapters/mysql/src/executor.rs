//! MySQL 语句执行器

use async_trait::async_trait;
use nobal_ports::{ExecError, StatementExecutor};
use sqlx::MySqlPool;
use tracing::debug;

use crate::error_code::to_exec_error;

/// 在连接池上执行迁移语句
///
/// 使用文本协议执行，DDL 不经过预处理语句
#[derive(Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatementExecutor for MySqlExecutor {
    async fn execute(&self, statement: &str) -> Result<u64, ExecError> {
        debug!(statement, "Executing statement");
        let result = sqlx::raw_sql(statement)
            .execute(&self.pool)
            .await
            .map_err(|e| to_exec_error(&e))?;
        Ok(result.rows_affected())
    }
}
