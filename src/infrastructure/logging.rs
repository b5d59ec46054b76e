//! 日志系统配置模块
//! 支持结构化日志和日志级别配置

use std::path::Path;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;

/// 初始化日志系统
///
/// 启用文件输出时返回后台写线程的守卫，调用方必须持有到进程结束，
/// 守卫被丢弃后文件日志停止落盘。
/// 秘密材料（助记词、私钥、密码）不允许进入任何日志层，
/// 需要输出可疑字符串时先经过 redact 模块脱敏。
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.enable_file_logging {
        let log_dir = config
            .log_file_path
            .as_ref()
            .and_then(|p| Path::new(p).parent())
            .unwrap_or_else(|| Path::new("./logs"));

        std::fs::create_dir_all(log_dir)?;

        let file_appender = rolling::daily(log_dir, "ironvault.log");
        let (non_blocking_appender, guard) = non_blocking(file_appender);

        if config.format == "json" {
            let file_layer = fmt::layer()
                .json()
                .with_writer(non_blocking_appender)
                .with_timer(ChronoUtc::rfc_3339());
            let stdout_layer = fmt::layer().json().with_timer(ChronoUtc::rfc_3339());

            Registry::default()
                .with(filter)
                .with(file_layer)
                .with(stdout_layer)
                .init();
        } else {
            let file_layer = fmt::layer()
                .with_writer(non_blocking_appender)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(false);
            let stdout_layer = fmt::layer()
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(true);

            Registry::default()
                .with(filter)
                .with(file_layer)
                .with(stdout_layer)
                .init();
        }

        return Ok(Some(guard));
    }

    if config.format == "json" {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_timer(ChronoUtc::rfc_3339()))
            .init();
    } else {
        Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(true),
            )
            .init();
    }

    Ok(None)
}

/// 简化初始化（使用默认配置）
///
/// 守卫交给进程生命周期托管，不再返还。
pub fn init_default_logging() {
    let config = LoggingConfig::default();
    match init_logging(&config) {
        Ok(guard) => std::mem::forget(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            tracing_subscriber::fmt::init();
        }
    }
}
