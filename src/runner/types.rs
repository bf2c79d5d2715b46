//! 任务结果与轮次指标类型
//!
//! 运行器不关心任务内容（泛型参数 `T`），只在指标摘要中原样记录；
//! 所有记录类型可序列化为 JSON，与磁盘指标日志的格式一致。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 错误严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criticality::Low => write!(f, "low"),
            Criticality::Medium => write!(f, "medium"),
            Criticality::High => write!(f, "high"),
        }
    }
}

/// 错误分类结果，附在失败任务的轮次摘要上
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    /// 分类名，如 "TimeoutError"
    #[serde(rename = "type")]
    pub kind: String,
    /// 分类的固定描述
    pub description: String,
    pub criticality: Criticality,
    /// 分类时的原始错误详情
    pub original_details: String,
}

/// 单个任务的处理结果
///
/// 约定：每轮提交 n 个任务，处理方必须返回 n 个结果且顺序一致。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult<T> {
    pub success: bool,
    pub details: String,
    pub task: T,
}

impl<T> TaskResult<T> {
    pub fn ok(task: T, details: impl Into<String>) -> Self {
        Self {
            success: true,
            details: details.into(),
            task,
        }
    }

    pub fn failed(task: T, details: impl Into<String>) -> Self {
        Self {
            success: false,
            details: details.into(),
            task,
        }
    }
}

/// 轮次摘要中的单任务条目；失败任务带错误分类
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary<T> {
    pub task: T,
    pub success: bool,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_classification: Option<ErrorClassification>,
}

/// 每轮追加一条的不可变指标记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundMetric<T> {
    pub timestamp: DateTime<Utc>,
    pub batch_size_at_round_start: usize,
    pub tasks_processed_count: usize,
    pub successful_tasks_count: usize,
    pub failed_tasks_count: usize,
    pub success_rate: f64,
    pub time_taken_seconds: f64,
    pub task_summaries: Vec<TaskSummary<T>>,
    /// 按严重级别统计的失败数
    pub error_summary_by_criticality: HashMap<Criticality, usize>,
    /// 本轮自适应动作的人类可读记录
    pub actions_taken: Vec<String>,
}

/// 运行状态快照，供调用方或操作者查看
#[derive(Debug, Clone, Serialize)]
pub struct RunnerStatus<T> {
    pub current_batch_size: usize,
    pub task_queue_length: usize,
    pub total_rounds: usize,
    /// 最近 10 轮指标，时间顺序
    pub recent_rounds: Vec<RoundMetric<T>>,
}
