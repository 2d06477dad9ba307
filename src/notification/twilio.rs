//! Twilio短信发送器模块
//!
//! 通过Twilio REST接口发送告警短信

use crate::config::types::TwilioConfig;
use crate::error::NotificationError;
use crate::notification::sender::{NotificationSender, MAX_MESSAGE_LENGTH};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

/// 手机号长度
const PHONE_LENGTH: usize = 10;

/// Twilio短信发送器
pub struct TwilioSender {
    /// HTTP客户端
    client: Client,
    /// Twilio配置
    config: TwilioConfig,
}

impl TwilioSender {
    /// 创建新的Twilio发送器
    ///
    /// # 参数
    /// * `config` - Twilio配置
    ///
    /// # 返回
    /// * `Result<Self>` - 发送器实例
    pub fn new(config: TwilioConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("创建HTTP客户端失败")?;

        Ok(Self { client, config })
    }

    /// 消息接口地址
    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    /// 校验手机号和消息内容
    fn validate(contact: &str, message: &str) -> Result<(String, String), NotificationError> {
        let phone = contact.trim();
        if phone.len() != PHONE_LENGTH {
            return Err(NotificationError::InvalidArgument(format!(
                "手机号长度必须为{PHONE_LENGTH}: {phone}"
            )));
        }

        let body = message.trim();
        let length = body.chars().count();
        if length == 0 || length > MAX_MESSAGE_LENGTH {
            return Err(NotificationError::InvalidArgument(format!(
                "短信长度必须在1到{MAX_MESSAGE_LENGTH}之间，实际: {length}"
            )));
        }

        Ok((phone.to_string(), body.to_string()))
    }
}

#[async_trait]
impl NotificationSender for TwilioSender {
    async fn send(&self, contact: &str, message: &str) -> Result<()> {
        let (phone, body) = Self::validate(contact, message)?;
        let to = format!("{}{}", self.config.country_code, phone);

        debug!("发送短信到: {}", to);

        let form = [
            ("From", self.config.from_phone.as_str()),
            ("To", to.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .context("发送Twilio短信失败")?;

        if response.status().is_success() {
            info!("短信发送成功: {}", to);
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("短信发送失败: {} - {}", status, text);
            Err(NotificationError::SendError(format!("Twilio返回状态码 {status}")).into())
        }
    }
}
