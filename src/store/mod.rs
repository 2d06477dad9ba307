//! 记录存储模块
//!
//! 定义按集合名和记录ID读写文档的存储接口，并提供文件和内存两种实现

pub mod file;
pub mod memory;

use crate::error::StoreResult;
use async_trait::async_trait;
use serde_json::Value;

// 重新导出主要类型
pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

/// 记录存储trait
///
/// 所有写操作都是整条记录覆盖，不提供局部更新和并发版本号。
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 列出集合中的全部记录ID
    ///
    /// 集合为空或不可读时返回错误。
    async fn list(&self, collection: &str) -> StoreResult<Vec<String>>;

    /// 读取一条记录
    async fn read(&self, collection: &str, id: &str) -> StoreResult<Value>;

    /// 创建新记录，记录已存在时失败
    async fn create(&self, collection: &str, id: &str, record: &Value) -> StoreResult<()>;

    /// 覆盖已有记录，记录不存在时失败
    async fn update(&self, collection: &str, id: &str, record: &Value) -> StoreResult<()>;

    /// 删除记录
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}
