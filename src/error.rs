//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Uptime Checker 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum UptimeError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 记录存储相关错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    /// 检查记录校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),

    /// 审计日志相关错误
    #[error("审计日志错误: {0}")]
    LogSink(#[from] LogSinkError),

    /// 通知相关错误
    #[error("通知错误: {0}")]
    Notification(#[from] NotificationError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 记录存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 集合中没有任何记录
    #[error("集合 {collection} 中没有记录")]
    EmptyCollection { collection: String },

    /// 记录不存在
    #[error("记录不存在: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// 记录已存在
    #[error("记录已存在: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    /// 记录内容无法解析
    #[error("记录已损坏: {collection}/{id}: {source}")]
    Corrupt {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// 底层IO失败
    #[error("存储IO失败: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// 检查记录校验错误，列出所有不合法的字段
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("检查记录 {} 格式无效，问题字段: {}", .record_id.as_deref().unwrap_or("<unknown>"), .fields.join(", "))]
pub struct ValidationError {
    /// 记录ID（如果能识别）
    pub record_id: Option<String>,
    /// 不合法的字段名
    pub fields: Vec<&'static str>,
}

impl ValidationError {
    /// 判断某个字段是否被拒绝
    pub fn rejects(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}

/// 审计日志错误类型
#[derive(Error, Debug)]
pub enum LogSinkError {
    /// 写入失败
    #[error("追加审计日志失败: {stream}: {source}")]
    Append {
        stream: String,
        #[source]
        source: std::io::Error,
    },

    /// 日志文件操作失败
    #[error("日志文件操作失败: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// 压缩归档内容无效
    #[error("日志归档无效: {0}")]
    InvalidArchive(String),

    /// 序列化失败
    #[error("审计记录序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 通知错误类型
#[derive(Error, Debug)]
pub enum NotificationError {
    /// 发送失败
    #[error("通知发送失败: {0}")]
    SendError(String),

    /// 模板渲染错误
    #[error("模板渲染失败: {0}")]
    TemplateError(String),

    /// 参数无效
    #[error("通知参数无效: {0}")]
    InvalidArgument(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, UptimeError>;

/// 存储操作结果类型别名
pub type StoreResult<T> = std::result::Result<T, StoreError>;
