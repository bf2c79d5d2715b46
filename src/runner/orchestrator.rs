//! 任务编排器：自适应批处理主循环
//!
//! 持有 FIFO 任务队列与自适应状态（batch_size、timeout_multiplier），
//! 每轮弹出一批交给 TaskProcessor，按失败分类调整参数并落盘指标。
//!
//! 并发模型：由单一逻辑调用方串行驱动 `run_round()`，轮次之间不重叠；
//! `&mut self` 使这一点在类型层面成立。编排器自身不设墙钟超时，
//! `timeout_multiplier` 是给处理方读取的建议值，不会中止任何一轮。

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use crate::config::AppConfig;
use crate::runner::classifier::classify;
use crate::runner::error::RunnerError;
use crate::runner::metrics_log::MetricsLog;
use crate::runner::processor::TaskProcessor;
use crate::runner::types::{Criticality, RoundMetric, RunnerStatus, TaskSummary};

/// 每命中一次 TimeoutError，超时预算乘以该系数；无上限也无衰减，
/// 处理方自行决定如何消化这个建议值
const TIMEOUT_BACKOFF_FACTOR: f64 = 1.2;

/// 状态快照中保留的最近轮数
const RECENT_ROUNDS: usize = 10;

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 首轮批大小
    pub initial_batch_size: usize,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    /// 指标日志文件路径
    pub metrics_path: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: 3,
            min_batch_size: 1,
            max_batch_size: 10,
            metrics_path: PathBuf::from("workspace/round_metrics.json"),
        }
    }
}

impl From<&AppConfig> for OrchestratorConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            initial_batch_size: cfg.runner.initial_batch_size,
            min_batch_size: cfg.runner.min_batch_size,
            max_batch_size: cfg.runner.max_batch_size,
            metrics_path: cfg.metrics.path.clone(),
        }
    }
}

/// 任务编排器
///
/// 任务负载 `T` 对编排器完全不透明，只要求可克隆、可序列化
/// （进指标摘要）且可跨线程传递。
pub struct TaskOrchestrator<T> {
    processor: Arc<dyn TaskProcessor<T>>,
    queue: VecDeque<T>,
    batch_size: usize,
    min_batch_size: usize,
    max_batch_size: usize,
    timeout_multiplier: f64,
    metrics_history: Vec<RoundMetric<T>>,
    metrics_log: MetricsLog,
}

impl<T> TaskOrchestrator<T>
where
    T: Clone + Serialize + Send + Sync,
{
    /// 创建编排器并初始化指标存储（损坏文件在此处自愈）
    pub fn new(processor: Arc<dyn TaskProcessor<T>>, config: OrchestratorConfig) -> Self {
        // 批大小下限至少为 1，初值收进 [min, max] 区间
        let min_batch_size = config.min_batch_size.max(1);
        let max_batch_size = config.max_batch_size.max(min_batch_size);
        let batch_size = config
            .initial_batch_size
            .max(min_batch_size)
            .min(max_batch_size);

        Self {
            processor,
            queue: VecDeque::new(),
            batch_size,
            min_batch_size,
            max_batch_size,
            timeout_multiplier: 1.0,
            metrics_history: Vec::new(),
            metrics_log: MetricsLog::initialize(&config.metrics_path),
        }
    }

    /// 追加任务到队尾；不检查任务内容
    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = T>) {
        self.queue.extend(tasks);
    }

    /// 执行一轮
    ///
    /// 队列为空时直接返回 `Ok(None)`，不调用处理方也不记指标。
    /// 否则弹出 `min(batch_size, 队列长度)` 个任务，恰好调用一次
    /// TaskProcessor，对失败结果逐个分类，更新自适应参数，
    /// 最后生成并持久化本轮的 RoundMetric。
    pub async fn run_round(&mut self) -> Result<Option<RoundMetric<T>>, RunnerError> {
        if self.queue.is_empty() {
            return Ok(None);
        }

        let batch_size_at_round_start = self.batch_size;
        let n = self.batch_size.min(self.queue.len());
        let batch: Vec<T> = self.queue.drain(..n).collect();

        let timestamp = Utc::now();
        let started = Instant::now();

        let results = self
            .processor
            .process(batch)
            .await
            .map_err(RunnerError::Processor)?;

        // 等长同序是处理方的硬性契约，违反即协作方损坏，不做恢复
        if results.len() != n {
            return Err(RunnerError::BatchContract {
                expected: n,
                actual: results.len(),
            });
        }

        let time_taken_seconds = started.elapsed().as_secs_f64();

        let mut task_summaries = Vec::with_capacity(n);
        let mut error_summary_by_criticality: HashMap<Criticality, usize> = HashMap::new();
        let mut actions_taken = Vec::new();
        let mut successful_tasks_count = 0usize;

        for (index, result) in results.into_iter().enumerate() {
            let error_classification = if result.success {
                successful_tasks_count += 1;
                None
            } else {
                let classification = classify(&result.details);
                *error_summary_by_criticality
                    .entry(classification.criticality)
                    .or_insert(0) += 1;

                if classification.kind == "TimeoutError" {
                    self.timeout_multiplier *= TIMEOUT_BACKOFF_FACTOR;
                    actions_taken.push(format!(
                        "Detected TimeoutError for task {}: increased timeout multiplier to {:.2}",
                        index, self.timeout_multiplier
                    ));
                }

                Some(classification)
            };

            task_summaries.push(TaskSummary {
                task: result.task,
                success: result.success,
                details: result.details,
                error_classification,
            });
        }

        let failed_tasks_count = n - successful_tasks_count;

        // 自适应批大小：全部成功加一；失败超过一个减一；
        // 恰好一个失败视为偶发，不调整
        if failed_tasks_count == 0 {
            self.batch_size = (self.batch_size + 1).min(self.max_batch_size);
        } else if failed_tasks_count > 1 {
            self.batch_size = (self.batch_size - 1).max(self.min_batch_size);
        }

        let metric = RoundMetric {
            timestamp,
            batch_size_at_round_start,
            tasks_processed_count: n,
            successful_tasks_count,
            failed_tasks_count,
            success_rate: successful_tasks_count as f64 / n as f64,
            time_taken_seconds,
            task_summaries,
            error_summary_by_criticality,
            actions_taken,
        };

        tracing::info!(
            "Round finished: {}/{} succeeded, batch size {} -> {}, {} tasks queued",
            successful_tasks_count,
            n,
            batch_size_at_round_start,
            self.batch_size,
            self.queue.len()
        );

        self.metrics_log.append(&metric);
        self.metrics_history.push(metric.clone());

        Ok(Some(metric))
    }

    /// 连续执行轮次直到队列清空；返回期间产生的全部轮次指标。
    /// 遇到致命错误立即停止并向上传播。
    pub async fn run_until_idle(&mut self) -> Result<Vec<RoundMetric<T>>, RunnerError> {
        let mut rounds = Vec::new();
        while let Some(metric) = self.run_round().await? {
            rounds.push(metric);
        }
        Ok(rounds)
    }

    /// 运行状态快照：当前批大小、队列长度、总轮数与最近 10 轮指标（时间顺序）
    pub fn status(&self) -> RunnerStatus<T> {
        let start = self.metrics_history.len().saturating_sub(RECENT_ROUNDS);
        RunnerStatus {
            current_batch_size: self.batch_size,
            task_queue_length: self.queue.len(),
            total_rounds: self.metrics_history.len(),
            recent_rounds: self.metrics_history[start..].to_vec(),
        }
    }

    /// 当前超时预算系数；处理方读取后用于自身的单任务超时
    pub fn current_timeout_multiplier(&self) -> f64 {
        self.timeout_multiplier
    }

    pub fn current_batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// 进程生命周期内的全部轮次指标；磁盘日志不在启动时回放到这里
    pub fn metrics_history(&self) -> &[RoundMetric<T>] {
        &self.metrics_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::types::TaskResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 全部成功
    struct SucceedingProcessor;

    #[async_trait]
    impl TaskProcessor<String> for SucceedingProcessor {
        async fn process(&self, batch: Vec<String>) -> Result<Vec<TaskResult<String>>, String> {
            Ok(batch
                .into_iter()
                .map(|task| TaskResult::ok(task, "done"))
                .collect())
        }
    }

    /// 按预置脚本逐个给出结果：None 成功，Some(详情) 失败
    struct ScriptedProcessor {
        outcomes: Vec<Option<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedProcessor {
        fn new(outcomes: Vec<Option<&str>>) -> Self {
            Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|o| o.map(|s| s.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskProcessor<String> for ScriptedProcessor {
        async fn process(&self, batch: Vec<String>) -> Result<Vec<TaskResult<String>>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(batch
                .into_iter()
                .enumerate()
                .map(|(i, task)| match self.outcomes.get(i).cloned().flatten() {
                    Some(details) => TaskResult::failed(task, details),
                    None => TaskResult::ok(task, "done"),
                })
                .collect())
        }
    }

    fn config_in(dir: &tempfile::TempDir, initial: usize, min: usize, max: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            initial_batch_size: initial,
            min_batch_size: min,
            max_batch_size: max,
            metrics_path: dir.path().join("metrics.json"),
        }
    }

    #[tokio::test]
    async fn test_empty_queue_round_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let processor = Arc::new(ScriptedProcessor::new(vec![]));
        let mut orchestrator: TaskOrchestrator<String> =
            TaskOrchestrator::new(processor.clone(), config_in(&dir, 3, 1, 10));

        let metric = orchestrator.run_round().await.unwrap();

        assert!(metric.is_none());
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
        assert!(orchestrator.metrics_history().is_empty());
    }

    #[tokio::test]
    async fn test_full_success_grows_batch() {
        // batch_size=2, max=5, 队列 [A,B,C]：A、B 成功后批大小升到 3，C 留在队列
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator =
            TaskOrchestrator::new(Arc::new(SucceedingProcessor), config_in(&dir, 2, 1, 5));
        orchestrator.add_tasks(["A", "B", "C"].map(String::from));

        let metric = orchestrator.run_round().await.unwrap().unwrap();

        assert_eq!(orchestrator.current_batch_size(), 3);
        assert_eq!(orchestrator.queue_len(), 1);
        assert_eq!(orchestrator.metrics_history().len(), 1);
        assert_eq!(metric.successful_tasks_count, 2);
        assert_eq!(metric.failed_tasks_count, 0);
        assert_eq!(metric.batch_size_at_round_start, 2);
        assert!((metric.success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_multiple_failures_shrink_batch_and_classify() {
        // 1 成功 + API 错误 + 超时：失败 2 个，批大小减一，
        // 严重级别统计 {high:1, medium:1}，超时系数变为 1.2
        let dir = tempfile::tempdir().unwrap();
        let processor = Arc::new(ScriptedProcessor::new(vec![
            None,
            Some("API error critical failure"),
            Some("Operation has timed out"),
        ]));
        let mut orchestrator = TaskOrchestrator::new(processor, config_in(&dir, 3, 1, 10));
        orchestrator.add_tasks(["A", "B", "C"].map(String::from));

        let metric = orchestrator.run_round().await.unwrap().unwrap();

        assert_eq!(metric.failed_tasks_count, 2);
        assert_eq!(orchestrator.current_batch_size(), 2);
        assert_eq!(
            metric.error_summary_by_criticality[&Criticality::High],
            1
        );
        assert_eq!(
            metric.error_summary_by_criticality[&Criticality::Medium],
            1
        );
        assert!((orchestrator.current_timeout_multiplier() - 1.2).abs() < 1e-9);
        assert_eq!(metric.actions_taken.len(), 1);
        assert!(metric.actions_taken[0].contains("TimeoutError for task 2"));
    }

    #[tokio::test]
    async fn test_single_failure_keeps_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let processor = Arc::new(ScriptedProcessor::new(vec![
            None,
            Some("invalid value: negative count"),
            None,
        ]));
        let mut orchestrator = TaskOrchestrator::new(processor, config_in(&dir, 3, 1, 10));
        orchestrator.add_tasks(["A", "B", "C"].map(String::from));

        let metric = orchestrator.run_round().await.unwrap().unwrap();

        assert_eq!(metric.failed_tasks_count, 1);
        assert_eq!(orchestrator.current_batch_size(), 3);
    }

    #[tokio::test]
    async fn test_batch_size_stays_within_bounds() {
        // 连续全成功也不会越过 max；连续多失败也不会低于 min
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator =
            TaskOrchestrator::new(Arc::new(SucceedingProcessor), config_in(&dir, 3, 1, 4));
        orchestrator.add_tasks((0..30).map(|i| format!("task-{i}")));

        while orchestrator.run_round().await.unwrap().is_some() {
            assert!(orchestrator.current_batch_size() <= 4);
            assert!(orchestrator.current_batch_size() >= 1);
        }
        assert_eq!(orchestrator.current_batch_size(), 4);

        let dir2 = tempfile::tempdir().unwrap();
        let failing = Arc::new(ScriptedProcessor::new(vec![
            Some("connection refused"),
            Some("connection refused"),
            Some("connection refused"),
        ]));
        let mut shrinking = TaskOrchestrator::new(failing, config_in(&dir2, 3, 2, 10));
        shrinking.add_tasks((0..12).map(|i| format!("task-{i}")));

        while shrinking.run_round().await.unwrap().is_some() {
            assert!(shrinking.current_batch_size() >= 2);
        }
        assert_eq!(shrinking.current_batch_size(), 2);
    }

    #[tokio::test]
    async fn test_timeout_multiplier_compounds_per_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let processor = Arc::new(ScriptedProcessor::new(vec![
            Some("request timeout"),
            Some("deadline exceeded"),
        ]));
        let mut orchestrator = TaskOrchestrator::new(processor, config_in(&dir, 2, 1, 10));
        orchestrator.add_tasks(["A", "B"].map(String::from));

        let metric = orchestrator.run_round().await.unwrap().unwrap();

        // 两次超时：1.0 * 1.2 * 1.2
        assert!((orchestrator.current_timeout_multiplier() - 1.44).abs() < 1e-9);
        assert_eq!(metric.actions_taken.len(), 2);
        assert_eq!(metric.error_summary_by_criticality[&Criticality::Medium], 2);
    }

    #[tokio::test]
    async fn test_fifo_order_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator =
            TaskOrchestrator::new(Arc::new(SucceedingProcessor), config_in(&dir, 2, 1, 10));
        orchestrator.add_tasks(["first", "second", "third"].map(String::from));

        let metric = orchestrator.run_round().await.unwrap().unwrap();

        let processed: Vec<&str> = metric
            .task_summaries
            .iter()
            .map(|s| s.task.as_str())
            .collect();
        assert_eq!(processed, vec!["first", "second"]);
        assert_eq!(orchestrator.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_status_snapshot_keeps_last_ten_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator =
            TaskOrchestrator::new(Arc::new(SucceedingProcessor), config_in(&dir, 1, 1, 1));
        orchestrator.add_tasks((0..12).map(|i| format!("task-{i}")));

        orchestrator.run_until_idle().await.unwrap();

        let status = orchestrator.status();
        assert_eq!(status.total_rounds, 12);
        assert_eq!(status.recent_rounds.len(), 10);
        assert_eq!(status.task_queue_length, 0);
        // 时间顺序：快照首条是第 3 轮，末条是第 12 轮
        assert_eq!(status.recent_rounds[0].task_summaries[0].task, "task-2");
        assert_eq!(status.recent_rounds[9].task_summaries[0].task, "task-11");
    }

    #[tokio::test]
    async fn test_initial_batch_size_clamped_into_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator: TaskOrchestrator<String> =
            TaskOrchestrator::new(Arc::new(SucceedingProcessor), config_in(&dir, 20, 1, 5));
        assert_eq!(orchestrator.current_batch_size(), 5);
    }
}
