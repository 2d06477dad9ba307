//! 审计日志轮转
//!
//! 按固定间隔压缩并清空审计日志

use crate::audit::file::FileLogSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// 日志轮转器，持有自己的定时任务句柄
pub struct LogRotator {
    sink: Arc<FileLogSink>,
    period: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl LogRotator {
    /// 创建新的日志轮转器
    ///
    /// # 参数
    /// * `sink` - 文件日志
    /// * `period` - 轮转间隔
    pub fn new(sink: Arc<FileLogSink>, period: Duration) -> Self {
        Self {
            sink,
            period,
            timer: Mutex::new(None),
        }
    }

    /// 启动定时轮转，第一次轮转在一个间隔之后
    pub async fn start(&self) {
        let mut timer = self.timer.lock().await;
        if timer.is_some() {
            return;
        }

        let sink = Arc::clone(&self.sink);
        let period = self.period;
        info!("启动日志轮转，间隔: {}秒", period.as_secs());

        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = sink.rotate().await {
                    error!("日志轮转失败: {}", e);
                }
            }
        }));
    }

    /// 停止定时轮转
    pub async fn stop(&self) {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
            info!("日志轮转已停止");
        }
    }

    /// 是否正在运行
    pub async fn is_running(&self) -> bool {
        self.timer.lock().await.is_some()
    }
}
