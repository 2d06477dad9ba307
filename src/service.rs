//! 服务管理模块
//!
//! 负责加载配置、组装巡检组件以及服务的启动和关闭

use crate::audit::{FileLogSink, LogRotator};
use crate::config::{self, Config, ConfigLoader, TomlConfigLoader};
use crate::health::{CheckScheduler, HttpProber, OutcomeProcessor, Scheduler};
use crate::notification::{AlertTemplate, NoOpSender, NotificationSender, TwilioSender};
use crate::store::FileRecordStore;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 服务组件结构
pub struct ServiceComponents {
    /// 巡检调度器
    pub scheduler: Arc<CheckScheduler>,
    /// 审计日志
    pub log_sink: Arc<FileLogSink>,
    /// 审计日志轮转器
    pub rotator: LogRotator,
}

/// 服务启动器
pub struct ServiceLauncher;

impl ServiceLauncher {
    /// 加载和验证配置
    ///
    /// # 参数
    /// * `config_path` - 配置文件路径，文件不存在时使用默认配置
    /// * `interval` - 命令行指定的巡检间隔
    ///
    /// # 返回
    /// * `Result<Config>` - 生效的配置
    pub async fn load_and_validate_config(
        config_path: &Path,
        interval: Option<u64>,
    ) -> Result<Config> {
        let mut config = if config_path.exists() {
            info!("加载配置文件: {}", config_path.display());
            TomlConfigLoader::new(true)
                .load_from_file(config_path)
                .await
                .context("加载配置文件失败")?
        } else {
            warn!("配置文件不存在，使用默认配置: {}", config_path.display());
            Config::default()
        };

        // 应用命令行参数覆盖
        if let Some(interval) = interval {
            config.global.check_interval_seconds = interval;
        }

        config::validate_config(&config)
            .map_err(|e| anyhow::anyhow!(e))
            .context("配置验证失败")?;

        Ok(config)
    }

    /// 初始化服务组件
    ///
    /// # 参数
    /// * `config` - 生效的配置
    ///
    /// # 返回
    /// * `Result<ServiceComponents>` - 组装好的组件
    pub fn initialize_service_components(config: &Config) -> Result<ServiceComponents> {
        info!("初始化服务组件...");
        let global = &config.global;

        let store = Arc::new(FileRecordStore::new(&global.data_dir));
        let log_sink = Arc::new(FileLogSink::new(&global.log_dir));

        let notifier: Arc<dyn NotificationSender> = match &config.twilio {
            Some(twilio) => {
                Arc::new(TwilioSender::new(twilio.clone()).context("创建短信发送器失败")?)
            }
            None => {
                warn!("未配置Twilio，告警短信将被丢弃");
                Arc::new(NoOpSender)
            }
        };

        let template =
            AlertTemplate::new(global.alert_template.as_deref()).context("编译告警模板失败")?;
        let processor = Arc::new(OutcomeProcessor::new(
            store.clone(),
            log_sink.clone(),
            notifier,
            template,
        ));

        let prober = Arc::new(HttpProber::new().context("创建HTTP探测器失败")?);
        let scheduler = Arc::new(CheckScheduler::new(store, prober, processor, global));

        let rotator = LogRotator::new(
            log_sink.clone(),
            Duration::from_secs(global.log_rotation_interval_seconds),
        );

        info!(
            "数据目录: {}, 审计日志目录: {}",
            global.data_dir.display(),
            global.log_dir.display()
        );

        Ok(ServiceComponents {
            scheduler,
            log_sink,
            rotator,
        })
    }

    /// 启动后台任务
    pub async fn start_background_tasks(components: &ServiceComponents) -> Result<()> {
        components
            .scheduler
            .start()
            .await
            .context("启动巡检调度器失败")?;
        components.rotator.start().await;
        Ok(())
    }

    /// 等待退出信号并清理
    pub async fn handle_shutdown_and_cleanup(components: &ServiceComponents) -> Result<()> {
        tokio::signal::ctrl_c()
            .await
            .context("监听退出信号失败")?;
        info!("收到退出信号，正在停止服务...");

        components.rotator.stop().await;
        components
            .scheduler
            .stop()
            .await
            .context("停止巡检调度器失败")?;

        info!("服务已停止");
        Ok(())
    }
}
