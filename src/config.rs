//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖
//! （双下划线表示嵌套，如 `HIVE__RUNNER__MAX_BATCH_SIZE=16`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub metrics: MetricsSection,
}

/// [runner] 段：批大小初值与上下限
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// 首轮批大小
    #[serde(default = "default_initial_batch_size")]
    pub initial_batch_size: usize,
    /// 批大小下限（失败收缩不会低于此值）
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,
    /// 批大小上限（全成功扩张不会高于此值）
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_initial_batch_size() -> usize {
    3
}

fn default_min_batch_size() -> usize {
    1
}

fn default_max_batch_size() -> usize {
    10
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            initial_batch_size: default_initial_batch_size(),
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// [metrics] 段：指标日志文件路径
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_metrics_path")]
    pub path: PathBuf,
}

fn default_metrics_path() -> PathBuf {
    PathBuf::from("workspace/round_metrics.json")
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            runner: RunnerSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
