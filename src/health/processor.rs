//! 探测结果处理模块
//!
//! 根据探测结果计算新状态，持久化检查记录，写入审计日志，并在状态翻转时发出告警

use crate::audit::{AuditRecord, LogSink};
use crate::check::{CheckDefinition, CheckState, CHECKS_COLLECTION};
use crate::health::ProbeOutcome;
use crate::notification::{AlertContext, AlertTemplate, NotificationSender};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 纯计算部分的结果，不涉及任何IO
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// 新状态
    pub new_state: CheckState,
    /// 是否需要告警
    pub alert_warranted: bool,
    /// 更新后的检查定义
    pub updated: CheckDefinition,
}

/// 根据探测结果计算新状态和告警决定
///
/// # 参数
/// * `definition` - 探测前的检查定义
/// * `outcome` - 探测结果
/// * `now` - 本次探测完成的时间
///
/// # 返回
/// * `Evaluation` - 新状态、是否告警以及更新后的定义
pub fn evaluate(
    definition: &CheckDefinition,
    outcome: &ProbeOutcome,
    now: DateTime<Utc>,
) -> Evaluation {
    let is_up = !outcome.is_failure()
        && outcome
            .response_code
            .is_some_and(|code| definition.accepts_status(code));
    let new_state = if is_up {
        CheckState::Up
    } else {
        CheckState::Down
    };

    // 首次探测只建立基线
    let alert_warranted = definition.has_been_checked() && definition.state != new_state;

    let mut updated = definition.clone();
    updated.state = new_state;
    updated.last_checked_at = Some(now);

    Evaluation {
        new_state,
        alert_warranted,
        updated,
    }
}

/// 单个检查的处理结果
#[derive(Debug)]
pub struct ProcessedCheck {
    /// 更新后的检查定义
    pub updated: CheckDefinition,
    /// 探测前的状态
    pub previous_state: CheckState,
    /// 新状态
    pub new_state: CheckState,
    /// 是否需要告警
    pub alert_warranted: bool,
    /// 是否成功写回存储
    pub persisted: bool,
    /// 是否成功写入审计日志
    pub audited: bool,
    /// 告警发送任务，调用方可以选择等待
    pub alert_task: Option<JoinHandle<()>>,
}

impl ProcessedCheck {
    /// 是否实际派发了告警
    pub fn alert_dispatched(&self) -> bool {
        self.alert_task.is_some()
    }
}

/// 探测结果处理器
pub struct OutcomeProcessor {
    /// 检查记录存储
    store: Arc<dyn RecordStore>,
    /// 审计日志
    log_sink: Arc<dyn LogSink>,
    /// 告警发送器
    notifier: Arc<dyn NotificationSender>,
    /// 告警消息模板
    template: AlertTemplate,
}

impl OutcomeProcessor {
    /// 创建新的处理器
    ///
    /// # 参数
    /// * `store` - 检查记录存储
    /// * `log_sink` - 审计日志
    /// * `notifier` - 告警发送器
    /// * `template` - 告警消息模板
    pub fn new(
        store: Arc<dyn RecordStore>,
        log_sink: Arc<dyn LogSink>,
        notifier: Arc<dyn NotificationSender>,
        template: AlertTemplate,
    ) -> Self {
        Self {
            store,
            log_sink,
            notifier,
            template,
        }
    }

    /// 处理一次探测结果
    ///
    /// 依次写回检查记录、追加审计日志，状态翻转且写回成功时派发告警。
    /// 所有失败都只记录日志，不向上传播。
    pub async fn process(
        &self,
        definition: &CheckDefinition,
        outcome: ProbeOutcome,
    ) -> ProcessedCheck {
        let now = Utc::now();
        let evaluation = evaluate(definition, &outcome, now);

        debug!(
            "检查 {} 探测完成: {} -> {} ({}ms)",
            definition.id,
            definition.state,
            evaluation.new_state,
            outcome.elapsed_ms()
        );

        let persisted = self.persist(&evaluation.updated).await;

        let record = AuditRecord::new(
            definition.clone(),
            outcome,
            evaluation.new_state,
            evaluation.alert_warranted,
            now,
        );
        let audited = self.audit(&record).await;

        let alert_task = match (evaluation.alert_warranted, persisted) {
            (true, true) => self.dispatch_alert(&evaluation.updated),
            (true, false) => {
                warn!("检查 {} 状态写回失败，本次不发送告警", definition.id);
                None
            }
            _ => None,
        };

        ProcessedCheck {
            updated: evaluation.updated,
            previous_state: definition.state,
            new_state: evaluation.new_state,
            alert_warranted: evaluation.alert_warranted,
            persisted,
            audited,
            alert_task,
        }
    }

    /// 写回检查记录（整体覆盖）
    async fn persist(&self, updated: &CheckDefinition) -> bool {
        let record = match updated.to_record() {
            Ok(record) => record,
            Err(e) => {
                error!("检查 {} 序列化失败: {}", updated.id, e);
                return false;
            }
        };

        match self.store.update(CHECKS_COLLECTION, &updated.id, &record).await {
            Ok(()) => true,
            Err(e) => {
                error!("写回检查记录失败 {}: {}", updated.id, e);
                false
            }
        }
    }

    /// 追加审计记录
    async fn audit(&self, record: &AuditRecord) -> bool {
        let line = match record.to_line() {
            Ok(line) => line,
            Err(e) => {
                error!("审计记录序列化失败 {}: {}", record.stream_id(), e);
                return false;
            }
        };

        match self.log_sink.append(record.stream_id(), &line).await {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// 派发告警任务，不等待发送结果
    fn dispatch_alert(&self, updated: &CheckDefinition) -> Option<JoinHandle<()>> {
        let context = AlertContext::new(updated, updated.state);
        let message = match self.template.render(&context) {
            Ok(message) => message,
            Err(e) => {
                error!("渲染告警消息失败 {}: {}", updated.id, e);
                return None;
            }
        };

        let notifier = Arc::clone(&self.notifier);
        let contact = updated.owner_id.clone();
        let check_id = updated.id.clone();

        Some(tokio::spawn(async move {
            match notifier.send(&contact, &message).await {
                Ok(()) => info!("告警已发送: {} -> {}", check_id, contact),
                Err(e) => error!("发送告警失败 {}: {:#}", check_id, e),
            }
        }))
    }
}
