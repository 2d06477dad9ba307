//! 巡检调度器模块
//!
//! 按固定间隔对所有检查执行一轮巡检，同一时刻最多只有一轮巡检在进行

use crate::check::{validate_check, CheckState, CHECKS_COLLECTION};
use crate::config::types::GlobalConfig;
use crate::error::StoreError;
use crate::health::{OutcomeProcessor, ProcessedCheck, Prober};
use crate::store::RecordStore;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// 单轮巡检的统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// 列出的检查数量
    pub listed: usize,
    /// 读取失败的数量
    pub read_failed: usize,
    /// 校验不通过的数量
    pub rejected: usize,
    /// 完成探测的数量
    pub probed: usize,
    /// 探测后为up的数量
    pub up: usize,
    /// 探测后为down的数量
    pub down: usize,
    /// 写回成功的数量
    pub persisted: usize,
    /// 派发的告警数量
    pub alerts: usize,
    /// 异常终止的任务数量
    pub panicked: usize,
    /// 耗时
    pub elapsed: Duration,
}

/// 单轮巡检报告
#[derive(Debug, Default)]
pub struct SweepReport {
    /// 统计信息
    pub summary: SweepSummary,
    /// 尚未完成的告警发送任务
    pub pending_alerts: Vec<JoinHandle<()>>,
}

impl SweepReport {
    /// 等待所有告警发送任务结束
    pub async fn wait_for_alerts(&mut self) {
        for result in join_all(self.pending_alerts.drain(..)).await {
            if let Err(e) = result {
                error!("告警发送任务异常终止: {}", e);
            }
        }
    }
}

/// 一次巡检触发的结果
#[derive(Debug)]
pub enum SweepOutcome {
    /// 巡检完成
    Completed(SweepReport),
    /// 上一轮巡检仍在进行，本次跳过
    Skipped,
    /// 无法列出检查，本轮中止
    Aborted(StoreError),
}

/// 调度器状态
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    /// 定时器是否运行中
    pub is_running: bool,
    /// 是否有巡检正在进行
    pub is_sweeping: bool,
    /// 完成的巡检次数
    pub completed_sweeps: u64,
    /// 因忙碌跳过的巡检次数
    pub skipped_sweeps: u64,
    /// 中止的巡检次数
    pub aborted_sweeps: u64,
    /// 最近一次完成的巡检统计
    pub last_sweep: Option<SweepSummary>,
    /// 最后更新时间
    pub last_update: Instant,
}

/// 调度器trait，定义调度接口
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// 启动调度器，立即执行一轮巡检并开始定时巡检
    ///
    /// # 返回
    /// * `Result<()>` - 启动结果
    async fn start(&self) -> Result<()>;

    /// 停止定时巡检，进行中的巡检会自行完成
    ///
    /// # 返回
    /// * `Result<()>` - 停止结果
    async fn stop(&self) -> Result<()>;

    /// 手动触发一轮巡检，忙碌时跳过
    ///
    /// # 返回
    /// * `SweepOutcome` - 巡检结果
    async fn trigger_sweep(&self) -> SweepOutcome;

    /// 获取调度器状态
    ///
    /// # 返回
    /// * `SchedulerStatus` - 当前状态
    async fn get_status(&self) -> SchedulerStatus;
}

/// 巡检忙碌标记的持有者，释放时清除标记
struct SweepGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> SweepGuard<'a> {
    fn try_acquire(busy: &'a AtomicBool) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { busy })
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// 巡检任务共享的上下文
struct SweepContext {
    /// 检查记录存储
    store: Arc<dyn RecordStore>,
    /// 探测器
    prober: Arc<dyn Prober>,
    /// 结果处理器
    processor: Arc<OutcomeProcessor>,
    /// 并发控制信号量
    semaphore: Option<Arc<Semaphore>>,
    /// 是否有巡检正在进行
    busy: AtomicBool,
    /// 调度器状态
    status: RwLock<SchedulerStatus>,
}

impl SweepContext {
    /// 执行一轮巡检，忙碌时直接跳过
    async fn trigger(self: &Arc<Self>) -> SweepOutcome {
        let Some(_guard) = SweepGuard::try_acquire(&self.busy) else {
            warn!("上一轮巡检仍在进行，跳过本轮");
            let mut status = self.status.write().await;
            status.skipped_sweeps += 1;
            status.last_update = Instant::now();
            return SweepOutcome::Skipped;
        };

        let outcome = match self.run_sweep().await {
            Ok(report) => SweepOutcome::Completed(report),
            Err(e) => {
                error!("列出检查失败，本轮巡检中止: {}", e);
                SweepOutcome::Aborted(e)
            }
        };

        let mut status = self.status.write().await;
        match &outcome {
            SweepOutcome::Completed(report) => {
                status.completed_sweeps += 1;
                status.last_sweep = Some(report.summary.clone());
            }
            SweepOutcome::Aborted(_) => status.aborted_sweeps += 1,
            SweepOutcome::Skipped => {}
        }
        status.last_update = Instant::now();

        outcome
    }

    /// 列出、读取、校验所有检查，并为每个检查派发一个探测任务
    async fn run_sweep(self: &Arc<Self>) -> std::result::Result<SweepReport, StoreError> {
        let started = Instant::now();
        let ids = self.store.list(CHECKS_COLLECTION).await?;

        let mut summary = SweepSummary {
            listed: ids.len(),
            ..SweepSummary::default()
        };
        debug!("开始巡检，检查数量: {}", ids.len());

        let reads = join_all(ids.iter().map(|id| async move {
            (id, self.store.read(CHECKS_COLLECTION, id).await)
        }))
        .await;

        let mut definitions = Vec::with_capacity(reads.len());
        for (id, read) in reads {
            let raw = match read {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("读取检查失败 {}: {}", id, e);
                    summary.read_failed += 1;
                    continue;
                }
            };

            match validate_check(&raw) {
                Ok(definition) => definitions.push(definition),
                Err(e) => {
                    warn!("跳过无效检查 {}: {}", id, e);
                    summary.rejected += 1;
                }
            }
        }

        let tasks: Vec<(String, JoinHandle<ProcessedCheck>)> = definitions
            .into_iter()
            .map(|definition| {
                let context = Arc::clone(self);
                let check_id = definition.id.clone();
                let task = tokio::spawn(async move {
                    // 信号量不会被关闭
                    let _permit = match &context.semaphore {
                        Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
                        None => None,
                    };

                    let outcome = context.prober.probe(&definition).await;
                    context.processor.process(&definition, outcome).await
                });
                (check_id, task)
            })
            .collect();

        let mut pending_alerts = Vec::new();
        for (check_id, task) in tasks {
            match task.await {
                Ok(processed) => {
                    summary.probed += 1;
                    match processed.new_state {
                        CheckState::Up => summary.up += 1,
                        _ => summary.down += 1,
                    }
                    if processed.persisted {
                        summary.persisted += 1;
                    }
                    if let Some(alert_task) = processed.alert_task {
                        summary.alerts += 1;
                        pending_alerts.push(alert_task);
                    }
                }
                Err(e) => {
                    error!("检查任务异常终止 {}: {}", check_id, e);
                    summary.panicked += 1;
                }
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            "巡检完成: 共{}个, 探测{}个 (up {}, down {}), 跳过{}个, 告警{}条, 耗时{}ms",
            summary.listed,
            summary.probed,
            summary.up,
            summary.down,
            summary.read_failed + summary.rejected,
            summary.alerts,
            summary.elapsed.as_millis()
        );

        Ok(SweepReport {
            summary,
            pending_alerts,
        })
    }
}

/// 检查巡检调度器
pub struct CheckScheduler {
    /// 巡检上下文
    context: Arc<SweepContext>,
    /// 巡检间隔
    interval: Duration,
    /// 定时器任务
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl CheckScheduler {
    /// 创建新的巡检调度器
    ///
    /// # 参数
    /// * `store` - 检查记录存储
    /// * `prober` - 探测器
    /// * `processor` - 结果处理器
    /// * `config` - 全局配置
    ///
    /// # 返回
    /// * `Self` - 调度器实例
    pub fn new(
        store: Arc<dyn RecordStore>,
        prober: Arc<dyn Prober>,
        processor: Arc<OutcomeProcessor>,
        config: &GlobalConfig,
    ) -> Self {
        let status = SchedulerStatus {
            is_running: false,
            is_sweeping: false,
            completed_sweeps: 0,
            skipped_sweeps: 0,
            aborted_sweeps: 0,
            last_sweep: None,
            last_update: Instant::now(),
        };

        Self {
            context: Arc::new(SweepContext {
                store,
                prober,
                processor,
                semaphore: config
                    .max_concurrent_checks
                    .map(|limit| Arc::new(Semaphore::new(limit))),
                busy: AtomicBool::new(false),
                status: RwLock::new(status),
            }),
            interval: Duration::from_secs(config.check_interval_seconds),
            timer: Mutex::new(None),
        }
    }

    /// 巡检间隔
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Scheduler for CheckScheduler {
    async fn start(&self) -> Result<()> {
        let mut timer = self.timer.lock().await;
        if timer.is_some() {
            warn!("巡检调度器已在运行");
            return Ok(());
        }

        info!("启动巡检调度器，间隔: {}秒", self.interval.as_secs());

        let context = Arc::clone(&self.context);
        let period = self.interval;
        *timer = Some(tokio::spawn(async move {
            // 第一次tick立即完成
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let context = Arc::clone(&context);
                tokio::spawn(async move {
                    context.trigger().await;
                });
            }
        }));

        let mut status = self.context.status.write().await;
        status.is_running = true;
        status.last_update = Instant::now();

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(timer) = self.timer.lock().await.take() {
            timer.abort();
            info!("巡检调度器已停止");
        }

        let mut status = self.context.status.write().await;
        status.is_running = false;
        status.last_update = Instant::now();

        Ok(())
    }

    async fn trigger_sweep(&self) -> SweepOutcome {
        self.context.trigger().await
    }

    async fn get_status(&self) -> SchedulerStatus {
        let mut status = self.context.status.read().await.clone();
        status.is_sweeping = self.context.busy.load(Ordering::Acquire);
        status
    }
}

impl Drop for CheckScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NoOpLogSink;
    use crate::check::CheckDefinition;
    use crate::health::ProbeOutcome;
    use crate::notification::{AlertTemplate, NoOpSender};
    use crate::store::MemoryRecordStore;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// 固定返回200并统计调用次数的探测器
    #[derive(Default)]
    struct CountingProber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, _definition: &CheckDefinition) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ProbeOutcome::responded(200)
        }
    }

    fn create_test_record(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "userPhone": "5551234567",
            "protocol": "http",
            "url": "example.com",
            "method": "get",
            "successCodes": [200],
            "timeoutSeconds": 1
        })
    }

    fn create_test_scheduler(
        store: Arc<MemoryRecordStore>,
        prober: Arc<CountingProber>,
        interval_seconds: u64,
    ) -> CheckScheduler {
        let processor = Arc::new(OutcomeProcessor::new(
            store.clone(),
            Arc::new(NoOpLogSink),
            Arc::new(NoOpSender),
            AlertTemplate::new(None).unwrap(),
        ));
        let config = GlobalConfig {
            check_interval_seconds: interval_seconds,
            max_concurrent_checks: Some(2),
            ..GlobalConfig::default()
        };
        CheckScheduler::new(store, prober, processor, &config)
    }

    #[test]
    fn test_sweep_guard_is_exclusive() {
        let busy = AtomicBool::new(false);

        let guard = SweepGuard::try_acquire(&busy);
        assert!(guard.is_some());
        assert!(SweepGuard::try_acquire(&busy).is_none());

        drop(guard);
        assert!(!busy.load(Ordering::SeqCst));
        assert!(SweepGuard::try_acquire(&busy).is_some());
    }

    #[tokio::test]
    async fn test_trigger_sweep_counts_and_updates_status() {
        let store = Arc::new(MemoryRecordStore::new());
        for id in ["aaaaaaaaaaaaaaaaaaaa", "bbbbbbbbbbbbbbbbbbbb", "cccccccccccccccccccc"] {
            store
                .insert(CHECKS_COLLECTION, id, create_test_record(id))
                .await;
        }
        store
            .insert(
                CHECKS_COLLECTION,
                "dddddddddddddddddddd",
                json!({"id": "dddddddddddddddddddd"}),
            )
            .await;

        let prober = Arc::new(CountingProber::default());
        let scheduler = create_test_scheduler(store, prober.clone(), 60);

        let SweepOutcome::Completed(report) = scheduler.trigger_sweep().await else {
            panic!("巡检应当完成");
        };
        assert_eq!(report.summary.listed, 4);
        assert_eq!(report.summary.rejected, 1);
        assert_eq!(report.summary.probed, 3);
        assert_eq!(report.summary.up, 3);
        assert_eq!(report.summary.persisted, 3);
        assert_eq!(report.summary.alerts, 0);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);

        let status = scheduler.get_status().await;
        assert_eq!(status.completed_sweeps, 1);
        assert!(!status.is_sweeping);
        assert_eq!(status.last_sweep, Some(report.summary));
    }

    #[tokio::test]
    async fn test_empty_store_aborts_sweep() {
        let store = Arc::new(MemoryRecordStore::new());
        let prober = Arc::new(CountingProber::default());
        let scheduler = create_test_scheduler(store, prober.clone(), 60);

        assert!(matches!(
            scheduler.trigger_sweep().await,
            SweepOutcome::Aborted(StoreError::EmptyCollection { .. })
        ));
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.get_status().await.aborted_sweeps, 1);
    }

    #[tokio::test]
    async fn test_start_runs_immediately_and_stop_cancels_timer() {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert(
                CHECKS_COLLECTION,
                "aaaaaaaaaaaaaaaaaaaa",
                create_test_record("aaaaaaaaaaaaaaaaaaaa"),
            )
            .await;
        let prober = Arc::new(CountingProber::default());
        let scheduler = create_test_scheduler(store, prober.clone(), 3600);

        scheduler.start().await.unwrap();
        assert!(scheduler.get_status().await.is_running);

        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.get_status().await.completed_sweeps == 0 {
            assert!(Instant::now() < deadline, "首轮巡检未执行");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);

        scheduler.stop().await.unwrap();
        let status = scheduler.get_status().await;
        assert!(!status.is_running);
        assert_eq!(status.completed_sweeps, 1);
    }
}
