//! 错误分类器
//!
//! 将失败详情映射到固定分类表。表按顺序扫描，首个命中的条目生效，
//! 因此靠前的分类优先级更高。纯函数，无状态无 I/O。

use std::fmt::Display;

use crate::runner::types::{Criticality, ErrorClassification};

/// 分类表：(分类名, 描述, 关键词, 严重级别)；顺序即优先级
const TAXONOMY: &[(&str, &str, &[&str], Criticality)] = &[
    (
        "TimeoutError",
        "Operation exceeded its time budget",
        &["timeout", "timed out", "deadline exceeded"],
        Criticality::Medium,
    ),
    (
        "APIError",
        "Upstream API rejected or failed the request",
        &[
            "api error",
            "api limit",
            "service unavailable",
            "internal server error",
            "bad gateway",
        ],
        Criticality::High,
    ),
    (
        "ConnectionError",
        "Network connection could not be established",
        &[
            "connection error",
            "cannot connect",
            "host not found",
            "network is unreachable",
            "connection refused",
            "failed to establish",
        ],
        Criticality::High,
    ),
    (
        "TypeError",
        "Value of an unexpected type was supplied",
        &["typeerror", "incorrect type", "argument type"],
        Criticality::Medium,
    ),
    (
        "ValueError",
        "Value was malformed or out of the accepted range",
        &["valueerror", "invalid value", "out of range"],
        Criticality::Medium,
    ),
    (
        "FileNotFoundError",
        "Referenced file does not exist",
        &["file not found", "no such file"],
        Criticality::Low,
    ),
    (
        "PermissionError",
        "Operation was denied by the platform",
        &["permission denied", "not permitted"],
        Criticality::Medium,
    ),
    (
        "AuthenticationError",
        "Credentials were missing, invalid or expired",
        &["authentication failed", "unauthorized", "401", "invalid credentials"],
        Criticality::High,
    ),
    (
        "ConfigurationError",
        "Runtime configuration is invalid or incomplete",
        &["configuration error", "invalid config", "missing setting"],
        Criticality::High,
    ),
];

/// 对失败详情做分类；入参先转为字符串再小写匹配，空串也是合法输入
///
/// 任意关键词以子串形式（不区分大小写）出现即命中；全表未命中时
/// 归入 UnknownError / low。
pub fn classify(details: impl Display) -> ErrorClassification {
    let original_details = details.to_string();
    let haystack = original_details.to_lowercase();

    for (kind, description, keywords, criticality) in TAXONOMY {
        if keywords.iter().any(|keyword| haystack.contains(keyword)) {
            return ErrorClassification {
                kind: (*kind).to_string(),
                description: (*description).to_string(),
                criticality: *criticality,
                original_details,
            };
        }
    }

    ErrorClassification {
        kind: "UnknownError".to_string(),
        description: "Failure did not match any known category".to_string(),
        criticality: Criticality::Low,
        original_details,
    }
}
