//! 领域服务接口
//!
//! 核心依赖的外部协作者：身份校验器、用户目录、配对关系门控。

pub mod auth_service;
pub mod match_gate;

// 重新导出服务
pub use auth_service::*;
pub use match_gate::*;
