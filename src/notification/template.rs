//! 消息模板模块
//!
//! 使用Handlebars渲染告警短信

use crate::check::{CheckDefinition, CheckState};
use crate::error::NotificationError;
use crate::notification::sender::MAX_MESSAGE_LENGTH;
use handlebars::Handlebars;
use serde::Serialize;

const TEMPLATE_NAME: &str = "alert";

/// 默认的告警消息模板
pub const DEFAULT_ALERT_TEMPLATE: &str =
    "Alert: Your check for {{method}} {{protocol}}://{{url}} is currently {{state}}";

/// 模板上下文数据
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    /// HTTP方法（大写）
    pub method: String,
    /// 协议
    pub protocol: String,
    /// 原始URL
    pub url: String,
    /// 主机
    pub host: String,
    /// 路径
    pub path: String,
    /// 新状态
    pub state: String,
    /// 检查ID
    pub check_id: String,
}

impl AlertContext {
    pub fn new(definition: &CheckDefinition, state: CheckState) -> Self {
        Self {
            method: definition.method.to_string(),
            protocol: definition.protocol.to_string(),
            url: definition.url.clone(),
            host: definition.host.clone(),
            path: definition.path.clone(),
            state: state.to_string(),
            check_id: definition.id.clone(),
        }
    }

    /// 校验模板用的示例上下文
    pub fn sample() -> Self {
        Self {
            method: "GET".to_string(),
            protocol: "https".to_string(),
            url: "example.com/health".to_string(),
            host: "example.com".to_string(),
            path: "/health".to_string(),
            state: CheckState::Up.to_string(),
            check_id: "abcdefghij0123456789".to_string(),
        }
    }
}

/// 告警消息模板
pub struct AlertTemplate {
    registry: Handlebars<'static>,
}

impl AlertTemplate {
    /// 编译告警模板
    ///
    /// # 参数
    /// * `template` - 模板字符串，为空时使用默认模板
    ///
    /// # 返回
    /// * `Result<Self, NotificationError>` - 模板实例
    pub fn new(template: Option<&str>) -> Result<Self, NotificationError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, template.unwrap_or(DEFAULT_ALERT_TEMPLATE))
            .map_err(|e| NotificationError::TemplateError(e.to_string()))?;

        Ok(Self { registry })
    }

    /// 渲染告警消息，超出短信长度的部分会被截断
    pub fn render(&self, context: &AlertContext) -> Result<String, NotificationError> {
        let rendered = self
            .registry
            .render(TEMPLATE_NAME, context)
            .map_err(|e| NotificationError::TemplateError(e.to_string()))?;

        Ok(rendered.chars().take(MAX_MESSAGE_LENGTH).collect())
    }

    /// 用示例数据试渲染一次，严格模式下引用不存在的变量会在这里暴露
    pub fn verify(&self) -> Result<(), NotificationError> {
        self.render(&AlertContext::sample()).map(|_| ())
    }
}
