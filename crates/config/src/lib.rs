//! 统一配置中心
//!
//! 提供实时服务的全局配置管理，包括：
//! - 服务监听地址
//! - 数据库连接（可选，缺省时使用内存实现）
//! - JWT认证
//! - 实时消息策略
//!
//! 加载顺序：默认值 -> 可选配置文件 (APP_CONFIG_FILE) -> 环境变量 (APP_*，`__` 表示嵌套)

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// JWT 密钥最小长度（256 位）
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[validate(nested)]
    pub server: ServerConfig,
    /// 数据库配置
    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,
    /// JWT认证配置
    #[validate(nested)]
    pub jwt: JwtConfig,
    /// 实时消息配置
    #[serde(default)]
    #[validate(nested)]
    pub realtime: RealtimeConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// 未设置时用户目录和配对查询使用内存实现
    #[validate(url)]
    pub url: Option<String>,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    #[validate(length(min = 1))]
    pub secret: String,
    #[validate(range(min = 1))]
    pub expiration_hours: i64,
}

/// 实时消息配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RealtimeConfig {
    /// 转发私聊消息前是否再次确认双方已配对
    #[serde(default)]
    pub enforce_match_gate: bool,
    /// 单条消息最大字符数
    #[validate(range(min = 1))]
    pub max_message_length: usize,
    /// 令牌校验通过后是否还要求用户存在于用户目录（未配置数据库时不生效）
    pub verify_user_exists: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enforce_match_gate: false,
            max_message_length: 2000,
            verify_user_exists: true,
        }
    }
}

impl Default for AppConfig {
    /// 默认配置仅用于开发环境
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 3000,
                cors_origins: vec!["http://localhost:5173".into()],
            },
            database: DatabaseConfig::default(),
            jwt: JwtConfig {
                secret: "dev-secret-key-not-for-production-use-minimum-32-chars".into(),
                expiration_hours: 24,
            },
            realtime: RealtimeConfig::default(),
        }
    }
}

impl AppConfig {
    /// 构建默认的 figment：默认值 -> 配置文件 -> 环境变量
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    /// 从环境加载并校验配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 从任意 figment 提取并校验配置
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = figment
            .extract()
            .map_err(|err| ConfigError::Load(Box::new(err)))?;
        cfg.check()?;
        Ok(cfg)
    }

    /// 验证配置有效性
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;

        if self.jwt.secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "JWT secret must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            )));
        }

        Ok(())
    }

    /// 是否仍在使用开发用的JWT密钥
    pub fn uses_development_secret(&self) -> bool {
        self.jwt.secret.contains("dev-secret") || self.jwt.secret.contains("not-for-production")
    }

    /// 监听地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 返回脱敏后的配置描述（用于日志）
    pub fn sanitize(&self) -> String {
        let mut sanitized = self.clone();
        sanitized.jwt.secret = "[REDACTED]".into();
        if let Some(url) = sanitized.database.url.as_mut() {
            if let Some(at) = url.rfind('@') {
                let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
                url.replace_range(scheme_end..at, "[REDACTED]");
            }
        }
        format!("{:?}", sanitized)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
}
