//! 审计日志模块
//!
//! 每次探测都会追加一条审计记录，与可变的检查记录相互独立

pub mod file;
pub mod rotation;

use crate::check::{CheckDefinition, CheckState};
use crate::error::LogSinkError;
use crate::health::ProbeOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// 重新导出主要类型
pub use file::FileLogSink;
pub use rotation::LogRotator;

/// 审计日志写入trait
#[async_trait]
pub trait LogSink: Send + Sync {
    /// 向指定日志流追加一行内容
    async fn append(&self, stream_id: &str, payload: &str) -> Result<(), LogSinkError>;
}

/// 单次探测的审计记录
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// 记录ID
    pub id: Uuid,
    /// 探测前的检查定义
    pub check: CheckDefinition,
    /// 探测结果
    pub outcome: ProbeOutcome,
    /// 新状态
    pub state: CheckState,
    /// 是否触发告警
    pub alert: bool,
    /// 记录时间
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        check: CheckDefinition,
        outcome: ProbeOutcome,
        state: CheckState,
        alert: bool,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            check,
            outcome,
            state,
            alert,
            time,
        }
    }

    /// 日志流名称，每个检查一个流
    pub fn stream_id(&self) -> &str {
        &self.check.id
    }

    /// 转换为单行JSON
    pub fn to_line(&self) -> Result<String, LogSinkError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 丢弃所有内容的日志实现（用于禁用审计日志）
pub struct NoOpLogSink;

#[async_trait]
impl LogSink for NoOpLogSink {
    async fn append(&self, _stream_id: &str, _payload: &str) -> Result<(), LogSinkError> {
        Ok(())
    }
}
