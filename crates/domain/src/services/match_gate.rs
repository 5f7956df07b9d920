//! 配对关系门控接口

use async_trait::async_trait;

use crate::errors::DomainResult;

/// 互相喜欢（配对）关系查询
///
/// 关系是对称的：`is_mutual_like(a, b) == is_mutual_like(b, a)`。
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MatchGate: Send + Sync {
    async fn is_mutual_like(&self, user_a: &str, user_b: &str) -> DomainResult<bool>;
}
