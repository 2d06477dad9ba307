//! 巡检流程集成测试

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uptime_checker::audit::LogSink;
use uptime_checker::check::{CheckDefinition, CHECKS_COLLECTION};
use uptime_checker::config::GlobalConfig;
use uptime_checker::error::{LogSinkError, StoreError, StoreResult};
use uptime_checker::health::{
    CheckScheduler, OutcomeProcessor, ProbeFailure, ProbeOutcome, Prober, Scheduler,
    SweepOutcome, SweepReport,
};
use uptime_checker::notification::{AlertTemplate, NotificationSender};
use uptime_checker::store::{MemoryRecordStore, RecordStore};

const CHECK_A: &str = "aaaaaaaaaaaaaaaaaaaa";
const CHECK_B: &str = "bbbbbbbbbbbbbbbbbbbb";

/// 按检查ID返回预设结果的探测器
#[derive(Default)]
struct StubProber {
    outcomes: Mutex<HashMap<String, ProbeOutcome>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubProber {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn set(&self, id: &str, outcome: ProbeOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(id.to_string(), outcome);
    }
}

#[async_trait]
impl Prober for StubProber {
    async fn probe(&self, definition: &CheckDefinition) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .get(&definition.id)
            .cloned()
            .unwrap_or_else(|| ProbeOutcome::responded(200))
    }
}

/// 记录所有发送内容的发送器
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, contact: &str, message: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((contact.to_string(), message.to_string()));
        Ok(())
    }
}

/// 记录所有追加内容的审计日志
#[derive(Default)]
struct RecordingLogSink {
    lines: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl LogSink for RecordingLogSink {
    async fn append(&self, stream_id: &str, payload: &str) -> Result<(), LogSinkError> {
        self.lines
            .lock()
            .unwrap()
            .push((stream_id.to_string(), payload.to_string()));
        Ok(())
    }
}

/// 可以按需注入失败的存储
#[derive(Default)]
struct FlakyStore {
    inner: MemoryRecordStore,
    fail_list: bool,
    fail_read_for: Option<String>,
    fail_update_for: Option<String>,
    list_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn list(&self, collection: &str) -> StoreResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(StoreError::Io {
                context: format!("读取集合目录 {collection}"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        self.inner.list(collection).await
    }

    async fn read(&self, collection: &str, id: &str) -> StoreResult<Value> {
        if self.fail_read_for.as_deref() == Some(id) {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.inner.read(collection, id).await
    }

    async fn create(&self, collection: &str, id: &str, record: &Value) -> StoreResult<()> {
        self.inner.create(collection, id, record).await
    }

    async fn update(&self, collection: &str, id: &str, record: &Value) -> StoreResult<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_update_for.as_deref() == Some(id) {
            return Err(StoreError::Io {
                context: format!("写入记录 {collection}/{id}"),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.update(collection, id, record).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }
}

struct TestHarness {
    store: Arc<FlakyStore>,
    prober: Arc<StubProber>,
    sender: Arc<RecordingSender>,
    log_sink: Arc<RecordingLogSink>,
    scheduler: CheckScheduler,
}

fn create_test_harness(store: FlakyStore, prober: StubProber) -> TestHarness {
    let store = Arc::new(store);
    let prober = Arc::new(prober);
    let sender = Arc::new(RecordingSender::default());
    let log_sink = Arc::new(RecordingLogSink::default());

    let processor = Arc::new(OutcomeProcessor::new(
        store.clone(),
        log_sink.clone(),
        sender.clone(),
        AlertTemplate::new(None).unwrap(),
    ));
    let config = GlobalConfig {
        check_interval_seconds: 60,
        max_concurrent_checks: Some(4),
        ..GlobalConfig::default()
    };
    let scheduler = CheckScheduler::new(store.clone(), prober.clone(), processor, &config);

    TestHarness {
        store,
        prober,
        sender,
        log_sink,
        scheduler,
    }
}

fn create_test_record(id: &str) -> Value {
    json!({
        "id": id,
        "userPhone": "5551234567",
        "protocol": "https",
        "url": "example.com/health",
        "method": "GET",
        "successCodes": [200],
        "timeoutSeconds": 2
    })
}

fn checked_record(id: &str, state: &str) -> Value {
    let mut record = create_test_record(id);
    record["state"] = json!(state);
    record["lastChecked"] = json!(1_600_000_000_000_i64);
    record
}

async fn seed(store: &FlakyStore, records: &[Value]) {
    for record in records {
        let id = record["id"].as_str().unwrap();
        store
            .inner
            .insert(CHECKS_COLLECTION, id, record.clone())
            .await;
    }
}

async fn stored(store: &FlakyStore, id: &str) -> Value {
    store.inner.get(CHECKS_COLLECTION, id).await.unwrap()
}

async fn completed(outcome: SweepOutcome) -> SweepReport {
    match outcome {
        SweepOutcome::Completed(mut report) => {
            report.wait_for_alerts().await;
            report
        }
        other => panic!("巡检应当完成: {other:?}"),
    }
}

#[tokio::test]
async fn test_first_probe_records_baseline_without_alert() {
    let harness = create_test_harness(FlakyStore::default(), StubProber::default());
    seed(&harness.store, &[create_test_record(CHECK_A)]).await;
    harness.prober.set(CHECK_A, ProbeOutcome::responded(200));

    let report = completed(harness.scheduler.trigger_sweep().await).await;
    assert_eq!(report.summary.probed, 1);
    assert_eq!(report.summary.alerts, 0);

    let record = stored(&harness.store, CHECK_A).await;
    assert_eq!(record["state"], "up");
    assert!(record["lastChecked"].as_i64().unwrap() > 0);
    assert!(harness.sender.messages().is_empty());
}

#[tokio::test]
async fn test_state_follows_success_codes() {
    let harness = create_test_harness(FlakyStore::default(), StubProber::default());
    let mut record_b = create_test_record(CHECK_B);
    record_b["successCodes"] = json!([200, 204]);
    seed(&harness.store, &[create_test_record(CHECK_A), record_b]).await;
    harness.prober.set(CHECK_A, ProbeOutcome::responded(204));
    harness.prober.set(CHECK_B, ProbeOutcome::responded(204));

    let report = completed(harness.scheduler.trigger_sweep().await).await;
    assert_eq!(report.summary.up, 1);
    assert_eq!(report.summary.down, 1);

    assert_eq!(stored(&harness.store, CHECK_A).await["state"], "down");
    assert_eq!(stored(&harness.store, CHECK_B).await["state"], "up");
}

#[tokio::test]
async fn test_alert_only_when_state_flips() {
    let harness = create_test_harness(FlakyStore::default(), StubProber::default());
    seed(
        &harness.store,
        &[checked_record(CHECK_A, "up"), checked_record(CHECK_B, "up")],
    )
    .await;
    harness.prober.set(CHECK_A, ProbeOutcome::responded(200));
    harness.prober.set(CHECK_B, ProbeOutcome::responded(500));

    let report = completed(harness.scheduler.trigger_sweep().await).await;
    assert_eq!(report.summary.alerts, 1);

    let messages = harness.sender.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "5551234567");
    assert_eq!(
        messages[0].1,
        "Alert: Your check for GET https://example.com/health is currently down"
    );
}

#[tokio::test]
async fn test_recovery_alert_mentions_up() {
    let harness = create_test_harness(FlakyStore::default(), StubProber::default());
    seed(&harness.store, &[checked_record(CHECK_A, "down")]).await;
    harness.prober.set(CHECK_A, ProbeOutcome::responded(200));

    completed(harness.scheduler.trigger_sweep().await).await;

    let record = stored(&harness.store, CHECK_A).await;
    assert_eq!(record["state"], "up");
    assert!(record["lastChecked"].as_i64().unwrap() > 1_600_000_000_000);

    let messages = harness.sender.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].1.contains("up"));

    let lines = harness.log_sink.lines.lock().unwrap().clone();
    assert_eq!(lines.len(), 1);
    let audit: Value = serde_json::from_str(&lines[0].1).unwrap();
    assert_eq!(audit["alert"], true);
    assert_eq!(audit["state"], "up");
}

#[tokio::test]
async fn test_timeout_on_first_probe_is_down_without_alert() {
    let harness = create_test_harness(FlakyStore::default(), StubProber::default());
    seed(&harness.store, &[create_test_record(CHECK_A)]).await;
    harness
        .prober
        .set(CHECK_A, ProbeOutcome::failed(ProbeFailure::Timeout));

    completed(harness.scheduler.trigger_sweep().await).await;

    let record = stored(&harness.store, CHECK_A).await;
    assert_eq!(record["state"], "down");
    assert!(record.get("lastChecked").is_some());
    assert!(harness.sender.messages().is_empty());

    let lines = harness.log_sink.lines.lock().unwrap().clone();
    let audit: Value = serde_json::from_str(&lines[0].1).unwrap();
    assert_eq!(audit["outcome"]["failure"]["kind"], "timeout");
    assert_eq!(audit["alert"], false);
}

#[tokio::test]
async fn test_out_of_range_timeout_is_rejected() {
    let harness = create_test_harness(FlakyStore::default(), StubProber::default());
    let mut invalid = create_test_record(CHECK_A);
    invalid["timeoutSeconds"] = json!(10);
    seed(&harness.store, &[invalid.clone(), create_test_record(CHECK_B)]).await;

    let report = completed(harness.scheduler.trigger_sweep().await).await;
    assert_eq!(report.summary.rejected, 1);
    assert_eq!(report.summary.probed, 1);

    // 被拒绝的记录保持原样
    assert_eq!(stored(&harness.store, CHECK_A).await, invalid);
    assert_eq!(harness.prober.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_list_failure_aborts_sweep() {
    let store = FlakyStore {
        fail_list: true,
        ..FlakyStore::default()
    };
    let harness = create_test_harness(store, StubProber::default());
    seed(&harness.store, &[create_test_record(CHECK_A)]).await;

    let outcome = harness.scheduler.trigger_sweep().await;
    assert!(matches!(outcome, SweepOutcome::Aborted(StoreError::Io { .. })));
    assert_eq!(harness.prober.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.store.update_calls.load(Ordering::SeqCst), 0);
    assert!(harness.log_sink.lines.lock().unwrap().is_empty());

    // 中止后不会卡住下一轮
    let status = harness.scheduler.get_status().await;
    assert_eq!(status.aborted_sweeps, 1);
    assert!(!status.is_sweeping);
}

#[tokio::test]
async fn test_update_failure_is_isolated() {
    let store = FlakyStore {
        fail_update_for: Some(CHECK_A.to_string()),
        ..FlakyStore::default()
    };
    let harness = create_test_harness(store, StubProber::default());
    seed(
        &harness.store,
        &[checked_record(CHECK_A, "down"), checked_record(CHECK_B, "down")],
    )
    .await;

    let report = completed(harness.scheduler.trigger_sweep().await).await;
    assert_eq!(report.summary.probed, 2);
    assert_eq!(report.summary.persisted, 1);

    assert_eq!(stored(&harness.store, CHECK_A).await["state"], "down");
    assert_eq!(stored(&harness.store, CHECK_B).await["state"], "up");

    // 写回失败的检查不告警
    assert_eq!(report.summary.alerts, 1);
    let messages = harness.sender.messages();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_read_failure_is_isolated() {
    let store = FlakyStore {
        fail_read_for: Some(CHECK_A.to_string()),
        ..FlakyStore::default()
    };
    let harness = create_test_harness(store, StubProber::default());
    seed(
        &harness.store,
        &[create_test_record(CHECK_A), create_test_record(CHECK_B)],
    )
    .await;

    let report = completed(harness.scheduler.trigger_sweep().await).await;
    assert_eq!(report.summary.read_failed, 1);
    assert_eq!(report.summary.probed, 1);
    assert_eq!(stored(&harness.store, CHECK_B).await["state"], "up");
    assert!(stored(&harness.store, CHECK_A).await.get("state").is_none());
}

#[tokio::test]
async fn test_overlapping_trigger_is_skipped() {
    let harness = create_test_harness(
        FlakyStore::default(),
        StubProber::with_delay(Duration::from_millis(200)),
    );
    seed(&harness.store, &[create_test_record(CHECK_A)]).await;

    let (first, second) = tokio::join!(
        harness.scheduler.trigger_sweep(),
        harness.scheduler.trigger_sweep()
    );

    assert!(matches!(first, SweepOutcome::Completed(_)));
    assert!(matches!(second, SweepOutcome::Skipped));
    assert_eq!(harness.store.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.prober.calls.load(Ordering::SeqCst), 1);

    let status = harness.scheduler.get_status().await;
    assert_eq!(status.completed_sweeps, 1);
    assert_eq!(status.skipped_sweeps, 1);

    // 忙碌标记已释放
    assert!(matches!(
        harness.scheduler.trigger_sweep().await,
        SweepOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn test_repeated_outcome_refreshes_timestamp_without_alert() {
    let harness = create_test_harness(FlakyStore::default(), StubProber::default());
    seed(&harness.store, &[checked_record(CHECK_A, "down")]).await;
    harness.prober.set(CHECK_A, ProbeOutcome::responded(200));

    completed(harness.scheduler.trigger_sweep().await).await;
    let first = stored(&harness.store, CHECK_A).await["lastChecked"]
        .as_i64()
        .unwrap();
    assert_eq!(harness.sender.messages().len(), 1);

    tokio::time::sleep(Duration::from_millis(5)).await;
    completed(harness.scheduler.trigger_sweep().await).await;
    let second = stored(&harness.store, CHECK_A).await["lastChecked"]
        .as_i64()
        .unwrap();

    assert!(second > first);
    assert_eq!(stored(&harness.store, CHECK_A).await["state"], "up");
    assert_eq!(harness.sender.messages().len(), 1);
}
