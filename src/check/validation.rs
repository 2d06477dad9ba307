//! 检查记录校验
//!
//! 把存储中读出的原始文档转换为强类型的 [`CheckDefinition`]。
//! 任何字段不合法都会导致整条记录被拒绝，错误中列出所有问题字段。

use crate::check::definition::{CheckDefinition, CheckMethod, CheckState, Protocol};
use crate::error::ValidationError;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Url;
use serde_json::Value;

/// 检查ID长度
pub const CHECK_ID_LENGTH: usize = 20;
/// 所有者手机号长度
pub const PHONE_LENGTH: usize = 10;
/// 允许的最小超时时间（秒）
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
/// 允许的最大超时时间（秒）
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

/// 校验原始检查记录
///
/// # 参数
/// * `raw` - 存储中读出的原始文档
///
/// # 返回
/// * `Result<CheckDefinition, ValidationError>` - 强类型定义或被拒绝的字段列表
pub fn validate_check(raw: &Value) -> Result<CheckDefinition, ValidationError> {
    let Some(record) = raw.as_object() else {
        return Err(ValidationError {
            record_id: None,
            fields: vec!["<record>"],
        });
    };

    let mut fields = Vec::new();

    let id = check_id(record.get("id"));
    if id.is_none() {
        fields.push("id");
    }

    let owner_id = check_phone(record.get("userPhone"));
    if owner_id.is_none() {
        fields.push("userPhone");
    }

    let protocol = record
        .get("protocol")
        .and_then(Value::as_str)
        .and_then(Protocol::parse);
    if protocol.is_none() {
        fields.push("protocol");
    }

    let target = check_url(record.get("url"), protocol.unwrap_or(Protocol::Http));
    if target.is_none() {
        fields.push("url");
    }

    let method = record
        .get("method")
        .and_then(Value::as_str)
        .and_then(CheckMethod::parse);
    if method.is_none() {
        fields.push("method");
    }

    let success_codes = check_success_codes(record.get("successCodes"));
    if success_codes.is_none() {
        fields.push("successCodes");
    }

    let timeout_seconds = check_timeout_seconds(record.get("timeoutSeconds"));
    if timeout_seconds.is_none() {
        fields.push("timeoutSeconds");
    }

    match (id, owner_id, protocol, target, method, success_codes, timeout_seconds) {
        (
            Some(id),
            Some(owner_id),
            Some(protocol),
            Some(target),
            Some(method),
            Some(success_codes),
            Some(timeout_seconds),
        ) => {
            let last_checked_at = check_last_checked(record.get("lastChecked"));
            let state = check_state(record.get("state"), last_checked_at.is_some());

            Ok(CheckDefinition {
                id,
                owner_id,
                protocol,
                url: target.raw,
                host: target.host,
                path: target.path,
                method,
                success_codes,
                timeout_seconds,
                state,
                last_checked_at,
            })
        }
        _ => Err(ValidationError {
            record_id: record
                .get("id")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string()),
            fields,
        }),
    }
}

/// 从URL字段解析出的目标地址
struct Target {
    raw: String,
    host: String,
    path: String,
}

fn check_id(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| id.len() == CHECK_ID_LENGTH)
        .map(str::to_string)
}

fn check_phone(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|phone| phone.len() == PHONE_LENGTH)
        .map(str::to_string)
}

fn check_url(value: Option<&Value>, protocol: Protocol) -> Option<Target> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())?;

    let parsed = Url::parse(&format!("{protocol}://{raw}")).ok()?;
    let host_name = parsed.host_str().filter(|host| !host.is_empty())?;

    let host = match parsed.port() {
        Some(port) => format!("{host_name}:{port}"),
        None => host_name.to_string(),
    };
    let path = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };

    Some(Target {
        raw: raw.to_string(),
        host,
        path,
    })
}

fn check_success_codes(value: Option<&Value>) -> Option<Vec<u16>> {
    let codes = value.and_then(Value::as_array)?;
    if codes.is_empty() {
        return None;
    }

    codes
        .iter()
        .map(|code| {
            code.as_u64()
                .filter(|code| (100..=599).contains(code))
                .map(|code| code as u16)
        })
        .collect()
}

fn check_timeout_seconds(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    let seconds = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
            .map(|f| f as u64)
    })?;

    (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS)
        .contains(&seconds)
        .then_some(seconds)
}

fn check_last_checked(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .filter(|ms| *ms > 0)
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// 从未探测过的记录一律视为 `unknown`；探测过但状态缺失或非法时按 `down` 处理
fn check_state(value: Option<&Value>, checked_before: bool) -> CheckState {
    if !checked_before {
        return CheckState::Unknown;
    }

    match value.and_then(Value::as_str) {
        Some("up") => CheckState::Up,
        _ => CheckState::Down,
    }
}
