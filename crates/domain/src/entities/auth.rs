//! 认证相关实体
//!
//! 定义JWT令牌声明和经过校验的连接身份。

use serde::{Deserialize, Serialize};

/// JWT令牌声明
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// 用户名（令牌主体）
    pub username: String,
    /// 邮箱
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// 签发时间
    pub iat: i64,
    /// 过期时间 (Unix timestamp)
    pub exp: i64,
}

/// 经过身份校验器确认的连接身份
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identity {
    pub username: String,
    pub email: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }
}
