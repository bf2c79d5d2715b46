//! Hive - Rust 智能体后台任务运行器
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **observability**: tracing 初始化
//! - **runner**: 核心运行层（编排、错误分类、指标持久化）
//!
//! 任务本身由外部 `TaskProcessor` 能力执行（Agent、工具池等都可以实现它）；
//! 运行器只负责排队、自适应批大小与超时预算、以及轮次指标的落盘。

pub mod config;
pub mod observability;
pub mod runner;

pub use runner::{
    classify, Criticality, ErrorClassification, MetricsLog, OrchestratorConfig, RoundMetric,
    RunnerError, RunnerStatus, TaskOrchestrator, TaskProcessor, TaskResult, TaskSummary,
};
