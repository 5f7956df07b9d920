//! WebSocket实时事件
//!
//! 线上帧格式为 `{"event": <名称>, "data": <负载>}` 的 JSON 文本。
//! 入站与出站事件都是封闭的枚举，新增事件类型需要修改这里并由编译器检查所有匹配。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::{ChatMessage, DeliveryReceipt, SendMessagePayload, TypingIndicator, TypingPayload};
use crate::errors::{DomainError, DomainResult};

/// 客户端到服务器的事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "sendMessage")]
    SendMessage(SendMessagePayload),
    #[serde(rename = "typing")]
    Typing(TypingPayload),
}

/// 解码前的通用信封
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ClientEvent {
    pub const SEND_MESSAGE: &'static str = "sendMessage";
    pub const TYPING: &'static str = "typing";

    /// 解码客户端文本帧
    ///
    /// - 已知事件且负载合法：`Ok(Some(event))`
    /// - 未知事件名：`Ok(None)`，调用方直接忽略以保持前向兼容
    /// - 帧不是信封或负载缺字段：`Err(MalformedEvent)`
    pub fn decode(text: &str) -> DomainResult<Option<Self>> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|err| DomainError::malformed_event("<frame>", err.to_string()))?;

        let event = match envelope.event.as_str() {
            Self::SEND_MESSAGE => serde_json::from_value(envelope.data)
                .map(ClientEvent::SendMessage),
            Self::TYPING => serde_json::from_value(envelope.data).map(ClientEvent::Typing),
            _ => return Ok(None),
        };

        event
            .map(Some)
            .map_err(|err| DomainError::malformed_event(envelope.event, err.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SendMessage(_) => Self::SEND_MESSAGE,
            ClientEvent::Typing(_) => Self::TYPING,
        }
    }

    /// 序列化为JSON字符串
    pub fn to_json(&self) -> DomainResult<String> {
        serde_json::to_string(self)
            .map_err(|e| DomainError::malformed_event(self.name(), e.to_string()))
    }
}

/// 连接内错误的负载
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    /// 消息为空或超长
    pub const INVALID_MESSAGE: &'static str = "INVALID_MESSAGE";
    /// 双方未配对
    pub const NOT_MATCHED: &'static str = "NOT_MATCHED";
    /// 配对关系查询失败
    pub const MATCH_GATE_UNAVAILABLE: &'static str = "MATCH_GATE_UNAVAILABLE";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// 服务器到客户端的事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// 只发给接收者
    #[serde(rename = "newMessage")]
    NewMessage(ChatMessage),
    /// 只回给发送者
    #[serde(rename = "messageSent")]
    MessageSent(DeliveryReceipt),
    /// 只发给接收者
    #[serde(rename = "userTyping")]
    UserTyping(TypingIndicator),
    /// 广播给所有连接的完整在线名单
    #[serde(rename = "connectedUsers")]
    ConnectedUsers(Vec<String>),
    /// 握手失败的原因
    #[serde(rename = "connect_error")]
    ConnectError(String),
    /// 会话内的错误，只回给触发的连接
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload::new(code, message))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::MessageSent(_) => "messageSent",
            ServerEvent::UserTyping(_) => "userTyping",
            ServerEvent::ConnectedUsers(_) => "connectedUsers",
            ServerEvent::ConnectError(_) => "connect_error",
            ServerEvent::Error(_) => "error",
        }
    }

    /// 序列化为JSON字符串
    pub fn to_json(&self) -> DomainResult<String> {
        serde_json::to_string(self)
            .map_err(|e| DomainError::malformed_event(self.name(), e.to_string()))
    }

    /// 从JSON字符串反序列化
    pub fn from_json(json: &str) -> DomainResult<Self> {
        serde_json::from_str(json).map_err(|e| DomainError::malformed_event("<frame>", e.to_string()))
    }
}
