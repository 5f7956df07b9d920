//! JWT认证基础设施实现
//!
//! 握手令牌的签发与校验。令牌签名有效后，可选地再确认令牌主体仍存在于用户目录。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use config::JwtConfig;
use domain::{AuthError, Claims, Identity, IdentityVerifier, UserDirectory};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

/// 基于 HS256 JWT 的身份校验器
#[derive(Clone)]
pub struct JwtIdentityVerifier {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl JwtIdentityVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
            directory: None,
        }
    }

    /// 校验通过后再到用户目录确认用户存在
    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// 签发令牌（测试与开发工具使用，正式签发由登录服务负责）
    pub fn generate_token(&self, username: &str, email: Option<&str>) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            username: username.to_string(),
            email: email.map(str::to_string),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| AuthError::unavailable(format!("token generation failed: {}", err)))
    }

    /// 只校验签名和有效期
    pub fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| AuthError::invalid_token(err.to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.decode_claims(token)?;

        if claims.username.trim().is_empty() {
            return Err(AuthError::invalid_token("token subject is empty"));
        }

        let Some(directory) = &self.directory else {
            return Ok(Identity::new(claims.username, claims.email.unwrap_or_default()));
        };

        match directory.find_identity(&claims.username).await {
            // 用户目录中的邮箱优先于令牌中的
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                tracing::warn!(username = %claims.username, "token subject no longer exists");
                Err(AuthError::UnknownUser {
                    username: claims.username,
                })
            }
            Err(err) => {
                tracing::error!(username = %claims.username, error = %err, "user directory lookup failed");
                Err(AuthError::unavailable(err.to_string()))
            }
        }
    }
}
