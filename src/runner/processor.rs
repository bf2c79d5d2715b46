//! 任务处理能力接口
//!
//! 运行器消费的外部可插拔能力：一次处理一批任务。批内如何并行
//! （线程、async 任务）由实现方自理，编排器不感知。

use async_trait::async_trait;

use crate::runner::types::TaskResult;

/// 批处理能力
///
/// 约定：返回的结果列表与入参批次等长且同序。单个任务失败以
/// `TaskResult { success: false, .. }` 返回；`Err` 通道只用于
/// 系统性故障，编排器不会捕获而是原样向上传播。
#[async_trait]
pub trait TaskProcessor<T>: Send + Sync {
    async fn process(&self, batch: Vec<T>) -> Result<Vec<TaskResult<T>>, String>;
}
