//! 通知模块
//!
//! 提供短信告警发送和消息模板功能

pub mod sender;
pub mod template;
pub mod twilio;

// 重新导出主要类型
pub use sender::{NoOpSender, NotificationSender};
pub use template::{AlertContext, AlertTemplate};
pub use twilio::TwilioSender;
