//! 运行器错误类型
//!
//! 只有两类致命错误会向调用方传播；单任务失败不在此列，
//! 它们进入指标与自适应策略被吸收。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// 处理能力整体失败（系统性故障，按约定原样传播）
    #[error("Processor failed: {0}")]
    Processor(String),

    /// 处理能力违反批契约：结果数与提交数不一致，说明协作方已损坏
    #[error("Processor contract violation: submitted {expected} tasks, got {actual} results")]
    BatchContract { expected: usize, actual: usize },
}
