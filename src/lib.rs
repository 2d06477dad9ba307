//! Uptime Checker - HTTP可用性巡检工具
//!
//! 按固定间隔探测用户登记的HTTP/HTTPS地址：
//! - 根据期望状态码判定 up/down
//! - 状态翻转时发送短信告警
//! - 每次探测写入审计日志，并定期压缩轮转
//! - 同一时刻只运行一轮巡检

pub mod audit;
pub mod check;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod notification;
pub mod service;
pub mod store;

// 重新导出主要类型
pub use check::{CheckDefinition, CheckState};
pub use config::{Config, GlobalConfig};
pub use error::UptimeError;
pub use health::{CheckScheduler, Scheduler, SweepOutcome};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
