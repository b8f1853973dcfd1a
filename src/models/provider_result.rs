use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider 失败分类
///
/// 只在适配器内部和日志中可见，编排器只关心成功或弃权。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 库或凭据缺失，进程生命周期内永久不可用
    ServiceUnavailable,
    /// 本地服务尚未就绪
    NotReady,
    /// 内存或配额耗尽
    ResourceExhausted,
    /// 凭据无效
    AuthInvalid,
    /// 被限流
    RateLimited,
    /// 请求超时
    Timeout,
    /// 响应缺少预期字段或为空
    MalformedResponse,
    /// 未知错误
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::ServiceUnavailable => "service_unavailable",
            FailureKind::NotReady => "not_ready",
            FailureKind::ResourceExhausted => "resource_exhausted",
            FailureKind::AuthInvalid => "auth_invalid",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Timeout => "timeout",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// 单次 provider 调用的结果
///
/// 要么给出一条已规范化的回复，要么明确弃权并附带失败原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResult {
    /// 成功，回复已带人设前缀
    Reply(String),
    /// 弃权
    Abstain(FailureKind),
}
