//! 指标日志存储
//!
//! 单文件 JSON 数组，每轮追加一条记录。文件缺失时创建为空数组；
//! 内容无法解析或不是数组时重建为空数组并告警（自愈，不报错）。
//! 写入失败只记日志：丢指标可以接受，任务处理不受影响。
//!
//! 采用整读整写而非流式追加。轮次串行且单写者，正确性没有问题；
//! 历史很大时可改为每行一条记录的追加日志，但那会改变磁盘格式，
//! 所有读取方都要跟着改。

use std::path::{Path, PathBuf};

use serde::Serialize;

/// JSON 数组指标日志；一个文件只允许一个写入方
#[derive(Debug)]
pub struct MetricsLog {
    path: PathBuf,
}

impl MetricsLog {
    /// 初始化存储：父目录与文件不存在时创建，损坏内容在此处自愈
    pub fn initialize(path: impl AsRef<Path>) -> Self {
        let log = Self {
            path: path.as_ref().to_path_buf(),
        };
        log.ensure_valid_array();
        log
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_valid_array(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match std::fs::read_to_string(&self.path) {
            Ok(data) => match serde_json::from_str::<serde_json::Value>(&data) {
                Ok(value) if value.is_array() => {}
                _ => {
                    tracing::warn!(
                        "Metrics log {} is not a valid JSON array, resetting",
                        self.path.display()
                    );
                    self.write_records(&[]);
                }
            },
            // 文件还不存在，写入空数组
            Err(_) => self.write_records(&[]),
        }
    }

    /// 追加一条记录：读出数组，push，整体重写；任何失败只告警
    pub fn append<R: Serialize>(&self, record: &R) {
        let value = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to serialize metrics record: {}", e);
                return;
            }
        };

        let mut records = self.read_records();
        records.push(value);
        self.write_records(&records);
    }

    /// 读回全部记录（时间顺序），供操作者或外部消费方检查
    pub fn load(&self) -> anyhow::Result<Vec<serde_json::Value>> {
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn read_records(&self) -> Vec<serde_json::Value> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default()
    }

    fn write_records(&self, records: &[serde_json::Value]) {
        let data = match serde_json::to_string_pretty(records) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Failed to serialize metrics log: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, data) {
            tracing::warn!(
                "Failed to write metrics log {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
