//! 身份校验服务接口
//!
//! 握手时把不透明的 bearer 令牌换成连接身份。

use async_trait::async_trait;

use crate::entities::auth::Identity;
use crate::errors::{AuthError, DomainResult};

/// 身份校验器
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// 校验令牌，返回用户名与邮箱
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// 用户目录
///
/// 令牌签名有效之后，再确认令牌主体仍是已注册用户。
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 根据用户名查找身份，不存在时返回 `Ok(None)`
    async fn find_identity(&self, username: &str) -> DomainResult<Option<Identity>>;
}
