//! 核心运行层：任务编排、错误分类、指标持久化

pub mod classifier;
pub mod error;
pub mod metrics_log;
pub mod orchestrator;
pub mod processor;
pub mod types;

pub use classifier::classify;
pub use error::RunnerError;
pub use metrics_log::MetricsLog;
pub use orchestrator::{OrchestratorConfig, TaskOrchestrator};
pub use processor::TaskProcessor;
pub use types::{
    Criticality, ErrorClassification, RoundMetric, RunnerStatus, TaskResult, TaskSummary,
};
