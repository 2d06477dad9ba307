//! 健康检测模块
//!
//! 提供HTTP探测、结果处理和巡检调度功能

pub mod checker;
pub mod processor;
pub mod result;
pub mod scheduler;

// 重新导出主要类型
pub use checker::{HttpProber, Prober};
pub use processor::{evaluate, Evaluation, OutcomeProcessor, ProcessedCheck};
pub use result::{ProbeFailure, ProbeOutcome};
pub use scheduler::{
    CheckScheduler, Scheduler, SchedulerStatus, SweepOutcome, SweepReport, SweepSummary,
};
