//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::notification::AlertTemplate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// Twilio短信配置，未配置时不发送告警
    pub twilio: Option<TwilioConfig>,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 巡检间隔（秒）
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// 单次巡检的最大并发探测数，不配置则不限制
    pub max_concurrent_checks: Option<usize>,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 是否输出JSON格式日志
    #[serde(default)]
    pub log_json: bool,
    /// 运行日志文件，配置后日志写入文件而不是控制台
    pub log_file: Option<PathBuf>,
    /// 检查记录存储目录
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// 审计日志目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 审计日志轮转间隔（秒）
    #[serde(default = "default_log_rotation_interval")]
    pub log_rotation_interval_seconds: u64,
    /// 告警消息模板
    pub alert_template: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            max_concurrent_checks: None,
            log_level: default_log_level(),
            log_json: false,
            log_file: None,
            data_dir: default_data_dir(),
            log_dir: default_log_dir(),
            log_rotation_interval_seconds: default_log_rotation_interval(),
            alert_template: None,
        }
    }
}

/// Twilio短信配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TwilioConfig {
    /// 账户SID
    pub account_sid: String,
    /// 认证令牌
    pub auth_token: String,
    /// 发送号码
    pub from_phone: String,
    /// 接收号码的国家区号前缀
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// API地址
    #[serde(default = "default_twilio_api_base_url")]
    pub api_base_url: String,
}

// 默认值函数
fn default_check_interval() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".data")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from(".logs")
}
fn default_log_rotation_interval() -> u64 {
    24 * 60 * 60
}
fn default_country_code() -> String {
    "+38".to_string()
}
fn default_twilio_api_base_url() -> String {
    "https://api.twilio.com".to_string()
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let global = &config.global;

    if global.check_interval_seconds == 0 {
        return Err("巡检间隔不能为0".to_string());
    }

    if global.max_concurrent_checks == Some(0) {
        return Err("最大并发探测数不能为0".to_string());
    }

    if global.log_rotation_interval_seconds == 0 {
        return Err("日志轮转间隔不能为0".to_string());
    }

    // 验证日志级别
    let valid_log_levels = ["debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            global.log_level, valid_log_levels
        ));
    }

    if global.data_dir.as_os_str().is_empty() {
        return Err("数据目录不能为空".to_string());
    }

    if global
        .log_file
        .as_ref()
        .is_some_and(|path| path.as_os_str().is_empty())
    {
        return Err("运行日志文件路径不能为空".to_string());
    }

    if global.log_dir.as_os_str().is_empty() {
        return Err("审计日志目录不能为空".to_string());
    }

    if let Some(template) = &global.alert_template {
        AlertTemplate::new(Some(template))
            .and_then(|compiled| compiled.verify())
            .map_err(|e| format!("告警模板无效: {e}"))?;
    }

    if let Some(twilio) = &config.twilio {
        if twilio.account_sid.trim().is_empty() || twilio.auth_token.trim().is_empty() {
            return Err("Twilio账户SID和认证令牌不能为空".to_string());
        }

        if twilio.from_phone.trim().is_empty() {
            return Err("Twilio发送号码不能为空".to_string());
        }

        if !twilio.country_code.starts_with('+') {
            return Err(format!("无效的国家区号: {}", twilio.country_code));
        }

        if !twilio.api_base_url.starts_with("http://")
            && !twilio.api_base_url.starts_with("https://")
        {
            return Err(format!("Twilio API地址格式无效: {}", twilio.api_base_url));
        }
    }

    Ok(())
}
