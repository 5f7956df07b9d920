use std::sync::Arc;

use application::{
    ChatEligibilityService, Clock, PresenceRegistry, RoutingPolicy, SessionManager,
    SessionManagerDependencies, SystemClock,
};
use config::AppConfig;
use domain::IdentityVerifier;
use infrastructure::Infrastructure;

#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub registry: Arc<PresenceRegistry>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub eligibility: Arc<ChatEligibilityService>,
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(
        session_manager: Arc<SessionManager>,
        verifier: Arc<dyn IdentityVerifier>,
        eligibility: Arc<ChatEligibilityService>,
        cors_origins: Vec<String>,
    ) -> Self {
        Self {
            registry: session_manager.registry().clone(),
            session_manager,
            verifier,
            eligibility,
            cors_origins,
        }
    }

    /// 按配置把基础设施适配器组装成应用状态
    pub fn from_infrastructure(config: &AppConfig, infrastructure: &Infrastructure) -> Self {
        Self::with_clock(config, infrastructure, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &AppConfig,
        infrastructure: &Infrastructure,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let verifier = infrastructure.identity_verifier();
        let registry = Arc::new(PresenceRegistry::new());

        let session_manager = SessionManager::new(SessionManagerDependencies {
            verifier: verifier.clone(),
            registry,
            match_gate: Some(infrastructure.match_gate.clone()),
            clock,
            policy: RoutingPolicy::from(&config.realtime),
        });

        let eligibility = ChatEligibilityService::new(infrastructure.match_gate.clone());

        Self::new(
            Arc::new(session_manager),
            verifier,
            Arc::new(eligibility),
            config.server.cors_origins.clone(),
        )
    }
}
