use std::sync::Arc;

use config::AppConfig;
use domain::{IdentityVerifier, MatchGate, UserDirectory};
use thiserror::Error;

use crate::{
    auth::JwtIdentityVerifier,
    memory::{InMemoryMatchGate, InMemoryUserDirectory},
    repository::{create_pg_pool, PgMatchGate, PgUserDirectory},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// 实时核心依赖的外部协作者
#[derive(Clone)]
pub struct Infrastructure {
    pub verifier: Arc<JwtIdentityVerifier>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub match_gate: Arc<dyn MatchGate>,
}

impl Infrastructure {
    /// 配置了数据库时使用 Postgres 实现，否则退回内存实现
    pub async fn connect(config: &AppConfig) -> Result<Self, InfrastructureError> {
        let (user_directory, match_gate): (Arc<dyn UserDirectory>, Arc<dyn MatchGate>) =
            match &config.database.url {
                Some(url) => {
                    let pool = create_pg_pool(url, config.database.max_connections).await?;
                    tracing::info!(max_connections = config.database.max_connections, "connected to postgres");
                    (
                        Arc::new(PgUserDirectory::new(pool.clone())),
                        Arc::new(PgMatchGate::new(pool)),
                    )
                }
                None => {
                    tracing::warn!("no database configured, using in-memory user directory and match gate");
                    (
                        Arc::new(InMemoryUserDirectory::new()),
                        Arc::new(InMemoryMatchGate::new()),
                    )
                }
            };

        // 内存用户目录没有数据来源，只有数据库支撑时才核对用户是否存在
        let verify_users = config.realtime.verify_user_exists && config.database.url.is_some();
        if config.realtime.verify_user_exists && !verify_users {
            tracing::info!("user existence check skipped without a database");
        }

        Ok(Self::assemble(config, user_directory, match_gate, verify_users))
    }

    /// 使用给定的适配器组装（测试用）
    ///
    /// 调用方负责填充用户目录，`realtime.verify_user_exists` 原样生效。
    pub fn with_adapters(
        config: &AppConfig,
        user_directory: Arc<dyn UserDirectory>,
        match_gate: Arc<dyn MatchGate>,
    ) -> Self {
        Self::assemble(
            config,
            user_directory,
            match_gate,
            config.realtime.verify_user_exists,
        )
    }

    fn assemble(
        config: &AppConfig,
        user_directory: Arc<dyn UserDirectory>,
        match_gate: Arc<dyn MatchGate>,
        verify_users: bool,
    ) -> Self {
        let mut verifier = JwtIdentityVerifier::new(config.jwt.clone());
        if verify_users {
            verifier = verifier.with_directory(user_directory.clone());
        }

        Self {
            verifier: Arc::new(verifier),
            user_directory,
            match_gate,
        }
    }

    pub fn identity_verifier(&self) -> Arc<dyn IdentityVerifier> {
        self.verifier.clone()
    }
}
