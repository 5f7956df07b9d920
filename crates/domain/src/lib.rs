//! 实时在线状态与私聊的核心领域模型
//!
//! 包含连接身份、聊天消息、输入状态以及客户端/服务端事件的定义，
//! 以及身份校验、配对关系查询等外部协作者的接口。

pub mod entities;
pub mod errors;
pub mod services;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use services::*;
