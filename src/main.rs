//! Uptime Checker 主程序入口

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use uptime_checker::cli::{command_for, Args};
use uptime_checker::config::{ConfigLoader, GlobalConfig, TomlConfigLoader};
use uptime_checker::logging::{LogConfig, LoggingSystem};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 日志级别需要先读取配置文件，读取失败时留给命令本身报告
    let global = load_global_for_logging(&args).await;
    let log_config = LogConfig::from_global(&global, args.log_level.map(Into::into));
    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("Uptime Checker v{} 启动", uptime_checker::VERSION);

    // 执行命令
    if let Err(e) = command_for(&args).execute(&args).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn load_global_for_logging(args: &Args) -> GlobalConfig {
    let config_path = args.get_config_path();
    if !config_path.exists() {
        return GlobalConfig::default();
    }

    TomlConfigLoader::new(true)
        .load_from_file(&config_path)
        .await
        .map(|config| config.global)
        .unwrap_or_default()
}
