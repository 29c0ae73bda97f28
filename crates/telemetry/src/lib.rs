//! telemetry - 可观测性库
//!
//! 日志写到 stderr，stdout 留给命令输出

use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// 初始化 tracing，已初始化时返回 false
pub fn init_tracing(log_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

/// 初始化 JSON 格式的 tracing（生产环境 / CI）
pub fn init_tracing_json(log_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}

/// 健康检查状态
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            healthy: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, name: impl Into<String>, healthy: bool, message: Option<String>) {
        if !healthy {
            self.healthy = false;
        }
        self.checks.push(HealthCheck {
            name: name.into(),
            healthy,
            message,
        });
    }

    /// 记录一个结果，错误转为不健康并带上错误信息
    pub fn record<T, E: std::fmt::Display>(
        &mut self,
        name: impl Into<String>,
        result: Result<T, E>,
        describe: impl FnOnce(T) -> Option<String>,
    ) {
        match result {
            Ok(value) => self.add_check(name, true, describe(value)),
            Err(e) => self.add_check(name, false, Some(e.to_string())),
        }
    }

    /// 取出前置步骤的结果，失败时记为不健康，成功时不单独记录
    pub fn require<T, E: std::fmt::Display>(
        &mut self,
        name: impl Into<String>,
        result: Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.add_check(name, false, Some(e.to_string()));
                None
            }
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}
