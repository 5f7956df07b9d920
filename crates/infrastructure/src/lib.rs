//! 基础设施层实现。
//!
//! 提供JWT身份校验、用户目录与配对关系的 Postgres / 内存适配器，实现领域层定义的接口。

pub mod auth;
pub mod builder;
pub mod memory;
pub mod repository;

pub use auth::JwtIdentityVerifier;
pub use builder::{Infrastructure, InfrastructureError};
pub use memory::{InMemoryMatchGate, InMemoryUserDirectory};
pub use repository::{create_pg_pool, PgMatchGate, PgUserDirectory};
