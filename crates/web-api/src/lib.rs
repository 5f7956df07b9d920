//! Web API 层。
//!
//! 提供 Axum 路由：WebSocket 实时通道，以及健康检查、在线名单、聊天资格等 REST 接口，
//! 把请求委托给应用层的会话管理器与用例服务。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::{bearer_token, extract_identity};
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
