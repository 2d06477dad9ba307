//! 通知发送器模块
//!
//! 定义通知发送的trait和基础实现

use anyhow::Result;
use async_trait::async_trait;

/// 告警短信的最大长度
pub const MAX_MESSAGE_LENGTH: usize = 160;

/// 通知发送器trait
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 向联系地址发送一条短消息
    ///
    /// # 参数
    /// * `contact` - 联系地址（手机号）
    /// * `message` - 消息内容
    ///
    /// # 返回
    /// * `Result<()>` - 发送结果
    async fn send(&self, contact: &str, message: &str) -> Result<()>;
}

/// 空的通知发送器实现（用于测试或禁用通知）
pub struct NoOpSender;

#[async_trait]
impl NotificationSender for NoOpSender {
    async fn send(&self, contact: &str, message: &str) -> Result<()> {
        tracing::debug!("通知已禁用，丢弃发往 {} 的消息: {}", contact, message);
        Ok(())
    }
}
