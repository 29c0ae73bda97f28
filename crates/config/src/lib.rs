//! nobal-config - 配置加载库
//!
//! 加载顺序（后者覆盖前者）：
//! 1. `{config_dir}/default.toml`
//! 2. `{config_dir}/{APP_ENV}.toml`
//! 3. `DB_HOST` / `DB_PORT` / `DB_USER` / `DB_PASSWORD` / `DB_NAME`
//! 4. `ERP_` 前缀变量，`__` 分隔层级，例如 `ERP_MIGRATOR__LEDGER_TABLE`

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 历史脚本沿用的数据库环境变量
const DB_ENV_KEYS: [&str; 5] = ["DB_HOST", "DB_PORT", "DB_USER", "DB_PASSWORD", "DB_NAME"];

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub name: String,
    /// `disabled` / `preferred` / `required` / `verify_ca` / `verify_identity`
    pub ssl_mode: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    /// 建立连接的最大尝试次数
    pub connect_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: Secret::new(String::new()),
            name: "nobalcasting".to_string(),
            ssl_mode: "preferred".to_string(),
            max_connections: 5,
            connect_timeout_secs: 30,
            connect_attempts: 3,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// 不含密码的连接描述，用于日志
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.name)
    }
}

/// 迁移器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// 迁移台账表名
    pub ledger_table: String,
    /// `GET_LOCK` 使用的锁名
    pub lock_name: String,
    pub lock_timeout_secs: u64,
    /// 校验和不一致时是否继续迁移
    pub allow_checksum_drift: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            ledger_table: "_schema_migrations".to_string(),
            lock_name: "nobalcasting.schema_migrator".to_string(),
            lock_timeout_secs: 10,
            allow_checksum_drift: false,
        }
    }
}

impl MigratorConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// 输出 JSON 格式日志
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// 后端 HTTP API 配置（probe 命令使用）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<Secret<String>>,
    pub timeout_secs: u64,
    /// 相对 `base_url` 的探测路径
    pub endpoints: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001/api".to_string(),
            token: None,
            timeout_secs: 10,
            endpoints: vec![
                "/selling/sales-orders".to_string(),
                "/production/work-orders".to_string(),
                "/production/job-cards".to_string(),
            ],
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn token(&self) -> Option<&str> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .filter(|t| !t.is_empty())
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub database: DatabaseConfig,
    pub migrator: MigratorConfig,
    pub telemetry: TelemetryConfig,
    pub api: ApiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "erp-migrate".to_string(),
            app_env: "development".to_string(),
            database: DatabaseConfig::default(),
            migrator: MigratorConfig::default(),
            telemetry: TelemetryConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config: Self = Self::figment(config_dir, &env).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// 构造分层配置源
    pub fn figment(config_dir: &str, env: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(("app_env", env))
            .merge(
                Env::raw()
                    .only(&DB_ENV_KEYS)
                    .map(|key| {
                        key.as_str()
                            .to_ascii_lowercase()
                            .replacen("db_", "database.", 1)
                            .into()
                    }),
            )
            .merge(Env::prefixed("ERP_").split("__"))
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        nobal_common::validate_identifier(&self.migrator.ledger_table)
            .map_err(|e| ConfigError::Invalid(format!("migrator.ledger_table: {}", e)))?;

        // GET_LOCK 锁名上限 64 字符
        if self.migrator.lock_name.is_empty() || self.migrator.lock_name.len() > 64 {
            return Err(ConfigError::Invalid(
                "migrator.lock_name must be 1..=64 characters".to_string(),
            ));
        }
        // 迁移锁在整个运行期间独占一个连接
        if self.database.max_connections < 2 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 2: the migration lock holds its own session"
                    .to_string(),
            ));
        }
        if self.database.name.is_empty() {
            return Err(ConfigError::Invalid("database.name must not be empty".to_string()));
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| ConfigError::Invalid(format!("api.base_url: {}", e)))?;

        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

#[cfg(test)]
mod tests;
