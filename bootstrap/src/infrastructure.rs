//! 基础设施资源
//!
//! 由配置建立 MySQL 连接池，并把适配器装配成迁移引擎

use std::sync::Arc;

use nobal_adapter_mysql::{
    MySqlAdvisoryLock, MySqlConfig, MySqlExecutor, MySqlLedger, MySqlSchemaInspector, SslMode,
    create_pool,
};
use nobal_config::{AppConfig, DatabaseConfig};
use nobal_errors::AppResult;
use nobal_migration_core::{Migrator, MigratorOptions};
use sqlx::MySqlPool;
use tracing::info;

/// 由数据库配置构造适配器配置
pub fn mysql_config(database: &DatabaseConfig) -> AppResult<MySqlConfig> {
    Ok(MySqlConfig::from_components(
        database.host.clone(),
        database.port,
        database.name.clone(),
        database.user.clone(),
    )
    .with_password(database.password.clone())
    .with_ssl_mode(SslMode::parse(&database.ssl_mode)?)
    .with_max_connections(database.max_connections)
    .with_connect_timeout(database.connect_timeout())
    .with_connect_attempts(database.connect_attempts))
}

/// 迁移引擎选项
pub fn migrator_options(config: &AppConfig) -> MigratorOptions {
    MigratorOptions {
        lock_timeout: config.migrator.lock_timeout(),
        allow_checksum_drift: config.migrator.allow_checksum_drift,
    }
}

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    pool: MySqlPool,
}

impl Infrastructure {
    /// 从配置创建（连接失败按配置重试）
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let mysql = mysql_config(&config.database)?;
        let pool = create_pool(&mysql).await?;
        info!(
            max_connections = mysql.max_connections,
            ssl_mode = mysql.ssl_mode.as_str(),
            "Infrastructure ready"
        );
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn ledger_table(&self) -> &str {
        &self.config.migrator.ledger_table
    }

    pub fn inspector(&self) -> MySqlSchemaInspector {
        MySqlSchemaInspector::new(self.pool.clone())
    }

    pub fn ledger(&self) -> AppResult<MySqlLedger> {
        MySqlLedger::new(self.pool.clone(), self.ledger_table())
    }

    pub fn lock(&self) -> MySqlAdvisoryLock {
        MySqlAdvisoryLock::new(self.pool.clone(), self.config.migrator.lock_name.clone())
    }

    /// 组装迁移引擎
    pub fn migrator(&self) -> AppResult<Migrator> {
        Ok(Migrator::new(
            Arc::new(self.inspector()),
            Arc::new(MySqlExecutor::new(self.pool.clone())),
            Arc::new(self.ledger()?),
            Arc::new(self.lock()),
        )
        .with_options(migrator_options(&self.config)))
    }

    /// 关闭连接池
    pub async fn close(self) {
        self.pool.close().await;
        info!("MySQL pool closed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use figment::Jail;
    use secrecy::{ExposeSecret, Secret};

    use super::*;

    #[test]
    fn test_mysql_config_from_database_config() {
        let database = DatabaseConfig {
            host: "db.internal".to_string(),
            port: 3307,
            user: "erp".to_string(),
            password: Secret::new("s3cret".to_string()),
            name: "nobalcasting".to_string(),
            ssl_mode: "required".to_string(),
            max_connections: 2,
            connect_timeout_secs: 5,
            connect_attempts: 4,
        };

        let mysql = mysql_config(&database).unwrap();
        assert_eq!(mysql.display_target(), "erp@db.internal:3307/nobalcasting");
        assert_eq!(mysql.ssl_mode, SslMode::Required);
        assert_eq!(mysql.max_connections, 2);
        assert_eq!(mysql.connect_timeout, Duration::from_secs(5));
        assert_eq!(mysql.connect_attempts, 4);
        assert_eq!(
            mysql.password.as_ref().map(|p| p.expose_secret().as_str()),
            Some("s3cret")
        );
    }

    #[test]
    fn test_invalid_ssl_mode_is_configuration_error() {
        let database = DatabaseConfig {
            ssl_mode: "sometimes".to_string(),
            ..Default::default()
        };
        let err = mysql_config(&database).unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_migrator_options_from_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "default.toml",
                "[migrator]\nlock_timeout_secs = 3\n",
            )?;
            jail.set_env("ERP_MIGRATOR__ALLOW_CHECKSUM_DRIFT", "true");

            let config = AppConfig::load(".").unwrap();
            let options = migrator_options(&config);
            assert_eq!(options.lock_timeout, Duration::from_secs(3));
            assert!(options.allow_checksum_drift);
            Ok(())
        });
    }
}
