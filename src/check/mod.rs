//! 检查定义模块
//!
//! 提供检查记录的数据模型和校验逻辑

pub mod definition;
pub mod validation;

// 重新导出主要类型
pub use definition::{CheckDefinition, CheckMethod, CheckState, Protocol, CHECKS_COLLECTION};
pub use validation::validate_check;
