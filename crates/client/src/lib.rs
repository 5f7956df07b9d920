//! 实时聊天客户端
//!
//! 客户端一侧的状态归约、输入状态去抖和带重连的 WebSocket 传输。

pub mod backoff;
pub mod error;
pub mod timeline;
pub mod transport;
pub mod typing;

pub use backoff::ReconnectPolicy;
pub use error::ClientError;
pub use timeline::{
    ChatTimeline, ConnectionStatus, DeliveryStatus, DisconnectReason, TimelineEvent,
    TimelineMessage,
};
pub use transport::{ClientConfig, RealtimeClient};
pub use typing::{TypingDebouncer, TYPING_IDLE};
