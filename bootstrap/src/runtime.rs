//! 运行时

use nobal_config::AppConfig;
use nobal_errors::{AppError, AppResult};
use nobal_telemetry::{init_tracing, init_tracing_json};
use tracing::{debug, info, warn};

/// 运行时配置
pub struct RuntimeConfig {
    pub config_dir: String,
    /// 强制 JSON 日志（`--json` 输出时避免日志与结果混排难以解析）
    pub json_logs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_dir: "config".to_string(),
            json_logs: false,
        }
    }
}

/// 加载 `.env`、配置并初始化日志
pub fn init_runtime(runtime: &RuntimeConfig) -> AppResult<AppConfig> {
    // .env 不存在时忽略
    let dotenv = dotenvy::dotenv();

    let config = AppConfig::load(&runtime.config_dir)
        .map_err(|e| AppError::configuration(e.to_string()))?;

    if runtime.json_logs || config.telemetry.json || config.is_production() {
        init_tracing_json(&config.telemetry.log_level);
    } else {
        init_tracing(&config.telemetry.log_level);
    }

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to read .env"),
    }
    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        "Runtime initialized"
    );
    Ok(config)
}

/// 等待 Ctrl+C / SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
