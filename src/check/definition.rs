//! 检查定义数据结构
//!
//! 定义经过校验的强类型检查记录，以及协议、方法和状态枚举

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 检查记录所在的存储集合名称
pub const CHECKS_COLLECTION: &str = "checks";

/// 探测协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// 解析协议字符串，只接受小写的 `http` 或 `https`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 探测使用的HTTP方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl CheckMethod {
    /// 解析HTTP方法，大小写不敏感
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "get" => Some(CheckMethod::Get),
            "post" => Some(CheckMethod::Post),
            "put" => Some(CheckMethod::Put),
            "delete" => Some(CheckMethod::Delete),
            _ => None,
        }
    }

    /// 转换为reqwest的方法类型
    pub fn to_http_method(self) -> reqwest::Method {
        match self {
            CheckMethod::Get => reqwest::Method::GET,
            CheckMethod::Post => reqwest::Method::POST,
            CheckMethod::Put => reqwest::Method::PUT,
            CheckMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for CheckMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckMethod::Get => "GET",
            CheckMethod::Post => "POST",
            CheckMethod::Put => "PUT",
            CheckMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// 检查状态
///
/// `Unknown` 只会出现在第一次探测完成之前，之后只会在 `Up` 和 `Down` 之间切换。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Unknown,
    Up,
    Down,
}

impl CheckState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Unknown => "unknown",
            CheckState::Up => "up",
            CheckState::Down => "down",
        }
    }

    /// 判断状态是否为正常
    pub fn is_up(&self) -> bool {
        matches!(self, CheckState::Up)
    }
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 经过校验的检查定义
///
/// 序列化格式与存储中的记录保持一致：`userPhone` 是所有者标识，
/// `lastChecked` 是毫秒时间戳。`host` 和 `path` 在校验时从 `url` 解析得到，不落盘。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDefinition {
    /// 检查ID
    pub id: String,
    /// 所有者标识（同时是短信联系号码）
    #[serde(rename = "userPhone")]
    pub owner_id: String,
    /// 协议
    pub protocol: Protocol,
    /// 原始URL（不含协议）
    pub url: String,
    /// 主机（带非默认端口）
    #[serde(skip)]
    pub host: String,
    /// 路径（带查询串）
    #[serde(skip)]
    pub path: String,
    /// HTTP方法
    pub method: CheckMethod,
    /// 视为正常的状态码
    pub success_codes: Vec<u16>,
    /// 超时时间（秒）
    pub timeout_seconds: u64,
    /// 当前状态
    pub state: CheckState,
    /// 最近一次完成探测的时间
    #[serde(
        rename = "lastChecked",
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl CheckDefinition {
    /// 完整的探测地址
    pub fn endpoint(&self) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.path)
    }

    /// 探测超时时间
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// 状态码是否属于成功状态码
    pub fn accepts_status(&self, status_code: u16) -> bool {
        self.success_codes.contains(&status_code)
    }

    /// 是否已经完成过至少一次探测
    pub fn has_been_checked(&self) -> bool {
        self.last_checked_at.is_some()
    }

    /// 转换为存储记录
    pub fn to_record(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
