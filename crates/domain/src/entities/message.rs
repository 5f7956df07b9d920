//! 私聊消息与输入状态实体
//!
//! 字段在线上以 camelCase 传输，与前端约定保持一致。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

/// 客户端发起的发送消息请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub recipient_username: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl SendMessagePayload {
    /// 校验接收者与消息正文
    pub fn validate(&self, max_length: usize) -> DomainResult<()> {
        if self.recipient_username.trim().is_empty() {
            return Err(DomainError::validation_error(
                "recipientUsername",
                "recipient cannot be empty",
            ));
        }
        if self.message.trim().is_empty() {
            return Err(DomainError::validation_error(
                "message",
                "message cannot be empty",
            ));
        }
        if self.message.chars().count() > max_length {
            return Err(DomainError::validation_error(
                "message",
                format!("message exceeds {} characters", max_length),
            ));
        }
        Ok(())
    }
}

/// 客户端发起的输入状态信号
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub recipient_username: String,
    pub is_typing: bool,
}

/// 转发给接收者的输入状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    pub sender_username: String,
    pub is_typing: bool,
}

/// 聊天消息
///
/// 服务端只负责转发，不持久化；`id` 仅用于客户端去重。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sender_username: String,
    pub recipient_username: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// 由发送者和请求负载构造消息记录
    pub fn from_payload(
        sender_username: impl Into<String>,
        payload: SendMessagePayload,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            sender_username: sender_username.into(),
            recipient_username: payload.recipient_username,
            message: payload.message,
            conversation_id: payload.conversation_id,
            timestamp,
        }
    }

    /// 判断消息是否属于 (a, b) 之间的会话，不区分方向
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_username == a && self.recipient_username == b)
            || (self.sender_username == b && self.recipient_username == a)
    }
}

/// 发给发送者的投递回执
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryReceipt {
    #[serde(flatten)]
    pub message: ChatMessage,
    /// 发送时接收者是否在线
    pub delivered: bool,
}
