//! 命令处理逻辑
//!
//! 实现各个CLI子命令

use crate::cli::args::{Args, Commands};
use crate::error::{ConfigError, Result};
use crate::health::{Scheduler, SweepOutcome};
use crate::service::ServiceLauncher;
use async_trait::async_trait;
use tracing::info;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 根据子命令选择处理器
pub fn command_for(args: &Args) -> Box<dyn Command> {
    match &args.command {
        Commands::Start { .. } => Box::new(StartCommand),
        Commands::Sweep => Box::new(SweepCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::RotateLogs => Box::new(RotateLogsCommand),
    }
}

/// 启动命令
pub struct StartCommand;

#[async_trait]
impl Command for StartCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let interval = match &args.command {
            Commands::Start { interval } => *interval,
            _ => None,
        };

        let config =
            ServiceLauncher::load_and_validate_config(&args.get_config_path(), interval).await?;
        let components = ServiceLauncher::initialize_service_components(&config)?;

        ServiceLauncher::start_background_tasks(&components).await?;
        info!("巡检服务已启动，按 Ctrl-C 退出");

        ServiceLauncher::handle_shutdown_and_cleanup(&components).await?;
        Ok(())
    }
}

/// 单轮巡检命令
pub struct SweepCommand;

#[async_trait]
impl Command for SweepCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config =
            ServiceLauncher::load_and_validate_config(&args.get_config_path(), None).await?;
        let components = ServiceLauncher::initialize_service_components(&config)?;

        match components.scheduler.trigger_sweep().await {
            SweepOutcome::Completed(mut report) => {
                // 退出前等待告警发送完成
                report.wait_for_alerts().await;

                let summary = &report.summary;
                println!("巡检完成");
                println!("  检查总数: {}", summary.listed);
                println!("  已探测: {}", summary.probed);
                println!("  up: {}  down: {}", summary.up, summary.down);
                println!("  读取失败: {}", summary.read_failed);
                println!("  格式无效: {}", summary.rejected);
                println!("  告警: {}", summary.alerts);
                println!("  耗时: {}ms", summary.elapsed.as_millis());
                Ok(())
            }
            SweepOutcome::Aborted(e) => Err(e.into()),
            SweepOutcome::Skipped => {
                println!("已有巡检在进行，本次跳过");
                Ok(())
            }
        }
    }
}

/// 配置验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let verbose = matches!(args.command, Commands::Validate { verbose: true });
        let config_path = args.get_config_path();
        println!("验证配置文件: {}", config_path.display());

        if !config_path.exists() {
            return Err(ConfigError::FileNotFound {
                path: config_path.to_string_lossy().to_string(),
            }
            .into());
        }

        let config = ServiceLauncher::load_and_validate_config(&config_path, None).await?;
        let global = &config.global;

        println!("✓ 配置文件验证通过");
        if verbose {
            println!("全局配置:");
            println!("  巡检间隔: {}秒", global.check_interval_seconds);
            match global.max_concurrent_checks {
                Some(limit) => println!("  最大并发: {limit}"),
                None => println!("  最大并发: 不限制"),
            }
            println!("  日志级别: {}", global.log_level);
            println!("  数据目录: {}", global.data_dir.display());
            println!("  审计日志目录: {}", global.log_dir.display());
            println!("  日志轮转间隔: {}秒", global.log_rotation_interval_seconds);
            println!(
                "  告警模板: {}",
                global.alert_template.as_deref().unwrap_or("默认")
            );
            match &config.twilio {
                Some(twilio) => println!(
                    "Twilio: {} (发送号码 {})",
                    twilio.api_base_url, twilio.from_phone
                ),
                None => println!("Twilio: 未配置"),
            }
        }

        Ok(())
    }
}

/// 日志轮转命令
pub struct RotateLogsCommand;

#[async_trait]
impl Command for RotateLogsCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config =
            ServiceLauncher::load_and_validate_config(&args.get_config_path(), None).await?;
        let components = ServiceLauncher::initialize_service_components(&config)?;

        let report = components.log_sink.rotate().await?;
        println!(
            "已轮转 {} 个日志，失败 {} 个",
            report.rotated.len(),
            report.failed.len()
        );
        Ok(())
    }
}
