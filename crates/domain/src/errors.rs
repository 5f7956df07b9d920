//! 领域模型错误定义
//!
//! 定义了实时核心中所有可能的错误类型，提供清晰的错误上下文。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 事件负载格式错误（缺少字段、类型不符等）
    #[error("malformed event `{event}`: {reason}")]
    MalformedEvent { event: String, reason: String },

    /// 验证错误
    #[error("验证失败: {field}: {message}")]
    ValidationError { field: String, message: String },

    /// 外部存储错误
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    /// 创建事件格式错误
    pub fn malformed_event(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 握手阶段的认证错误
///
/// `Display` 输出即为发给客户端的原因字符串。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication error: No token provided")]
    MissingToken,

    #[error("Authentication error: Invalid token")]
    InvalidToken { detail: String },

    /// 令牌有效但用户已不存在
    #[error("Authentication error: Invalid token")]
    UnknownUser { username: String },

    /// 身份查询依赖不可用
    #[error("Authentication error: Identity service unavailable")]
    Unavailable { detail: String },
}

impl AuthError {
    pub fn invalid_token(detail: impl Into<String>) -> Self {
        Self::InvalidToken {
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable {
            detail: detail.into(),
        }
    }

    /// 发给客户端的原因字符串
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
