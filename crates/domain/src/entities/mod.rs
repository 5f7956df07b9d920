//! 领域实体定义
//!
//! 包含连接身份、聊天消息、在线状态和实时事件。

pub mod auth;
pub mod message;
pub mod presence;
pub mod websocket;

// 重新导出核心实体
pub use auth::{Claims, Identity};
pub use message::{ChatMessage, DeliveryReceipt, SendMessagePayload, TypingIndicator, TypingPayload};
pub use presence::{ConnectionId, SessionState};
pub use websocket::{ClientEvent, ErrorPayload, ServerEvent};
