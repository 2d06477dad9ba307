//! 探测结果数据结构
//!
//! 定义单次探测的结果类型和失败原因

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 探测失败原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "details", rename_all = "lowercase")]
pub enum ProbeFailure {
    /// 在超时时间内没有收到响应
    Timeout,
    /// 无法建立连接
    Connect(String),
    /// 其他传输层错误
    Transport(String),
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::Timeout => write!(f, "Request timeout"),
            ProbeFailure::Connect(details) => write!(f, "Connection failed: {details}"),
            ProbeFailure::Transport(details) => write!(f, "Request failed: {details}"),
        }
    }
}

/// 单次探测结果
///
/// `response_code` 和 `failure` 互斥：收到响应时只有状态码，失败时只有失败原因。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    /// HTTP状态码
    pub response_code: Option<u16>,
    /// 失败原因
    pub failure: Option<ProbeFailure>,
    /// 耗时
    #[serde(with = "duration_serde", rename = "elapsedMs")]
    pub elapsed: Duration,
}

impl ProbeOutcome {
    /// 收到响应
    pub fn responded(status_code: u16) -> Self {
        Self {
            response_code: Some(status_code),
            failure: None,
            elapsed: Duration::ZERO,
        }
    }

    /// 探测失败
    pub fn failed(failure: ProbeFailure) -> Self {
        Self {
            response_code: None,
            failure: Some(failure),
            elapsed: Duration::ZERO,
        }
    }

    /// 设置耗时
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// 是否失败
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// 耗时（毫秒）
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Duration序列化模块
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_and_failure_are_exclusive() {
        let ok = ProbeOutcome::responded(204);
        assert_eq!(ok.response_code, Some(204));
        assert!(!ok.is_failure());

        let failed = ProbeOutcome::failed(ProbeFailure::Timeout);
        assert!(failed.response_code.is_none());
        assert!(failed.is_failure());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = ProbeOutcome::failed(ProbeFailure::Connect("refused".to_string()))
            .with_elapsed(Duration::from_millis(42));
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["responseCode"], serde_json::Value::Null);
        assert_eq!(json["failure"]["kind"], "connect");
        assert_eq!(json["failure"]["details"], "refused");
        assert_eq!(json["elapsedMs"], 42);
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(ProbeFailure::Timeout.to_string(), "Request timeout");
        assert!(ProbeFailure::Transport("boom".into())
            .to_string()
            .contains("boom"));
    }
}
