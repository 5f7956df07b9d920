use std::sync::Arc;

use domain::{
    AuthError, ClientEvent, ConnectionId, Identity, IdentityVerifier, MatchGate, SessionState,
};

use crate::clock::Clock;
use crate::presence::{EventSender, PresenceRegistry};
use crate::router::{MessageRouter, RoutingPolicy};
use crate::typing::TypingNotifier;

/// 会话管理器依赖
pub struct SessionManagerDependencies {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub registry: Arc<PresenceRegistry>,
    pub match_gate: Option<Arc<dyn MatchGate>>,
    pub clock: Arc<dyn Clock>,
    pub policy: RoutingPolicy,
}

/// 已通过认证、尚未登记在线状态的会话
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub identity: Identity,
}

/// 活跃会话，对应一条已登记的连接
#[derive(Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub identity: Identity,
    state: SessionState,
    sender: EventSender,
}

impl Session {
    pub fn username(&self) -> &str {
        &self.identity.username
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sender(&self) -> &EventSender {
        &self.sender
    }
}

/// 实时会话管理器
///
/// 握手认证、登记在线、分发入站事件、断开时注销。
/// 传输层（WebSocket）只负责收发帧，所有状态变化都经过这里。
#[derive(Clone)]
pub struct SessionManager {
    verifier: Arc<dyn IdentityVerifier>,
    registry: Arc<PresenceRegistry>,
    clock: Arc<dyn Clock>,
    router: MessageRouter,
    typing: TypingNotifier,
}

impl SessionManager {
    pub fn new(deps: SessionManagerDependencies) -> Self {
        let SessionManagerDependencies {
            verifier,
            registry,
            match_gate,
            clock,
            policy,
        } = deps;

        let router = MessageRouter::new(registry.clone(), clock.clone(), match_gate, policy);
        let typing = TypingNotifier::new(registry.clone());

        Self {
            verifier,
            registry,
            clock,
            router,
            typing,
        }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// 握手认证
    ///
    /// 失败时会话直接进入 Closed，错误的 `Display` 就是发给客户端的原因。
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthenticatedSession, AuthError> {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => {
                tracing::debug!("handshake without token");
                return Err(AuthError::MissingToken);
            }
        };

        match self.verifier.verify(token).await {
            Ok(identity) => {
                tracing::debug!(username = %identity.username, "handshake authenticated");
                Ok(AuthenticatedSession { identity })
            }
            Err(err) => {
                tracing::warn!(error = ?err, "handshake rejected");
                Err(err)
            }
        }
    }

    /// 登记在线状态并广播名单，会话进入 Active
    pub async fn activate(&self, pending: AuthenticatedSession, sender: EventSender) -> Session {
        let identity = pending.identity;
        let registration = self
            .registry
            .connect(&identity, sender.clone(), self.clock.now())
            .await;

        Session {
            connection_id: registration.connection_id,
            identity,
            state: SessionState::Active,
            sender,
        }
    }

    /// 处理一个入站文本帧
    ///
    /// 格式错误或未知事件直接丢弃，不关闭连接。
    pub async fn handle_frame(&self, session: &Session, text: &str) {
        match ClientEvent::decode(text) {
            Ok(Some(event)) => self.dispatch(session, event).await,
            Ok(None) => {
                tracing::debug!(
                    username = %session.username(),
                    connection_id = %session.connection_id,
                    "ignoring unknown event"
                );
            }
            Err(err) => {
                tracing::warn!(
                    username = %session.username(),
                    connection_id = %session.connection_id,
                    error = %err,
                    "dropping malformed frame"
                );
            }
        }
    }

    pub async fn dispatch(&self, session: &Session, event: ClientEvent) {
        if session.state != SessionState::Active {
            tracing::debug!(
                connection_id = %session.connection_id,
                state = ?session.state,
                "event on inactive session ignored"
            );
            return;
        }

        match event {
            ClientEvent::SendMessage(payload) => {
                self.router
                    .route(session.username(), &session.sender, payload)
                    .await;
            }
            ClientEvent::Typing(payload) => {
                self.typing.notify(session.username(), payload).await;
            }
        }
    }

    /// 关闭会话，重复调用无副作用
    ///
    /// 返回是否真的删除了在线记录（被新连接顶替时为 false）。
    pub async fn close(&self, session: &mut Session) -> bool {
        if session.state.is_terminal() {
            return false;
        }
        debug_assert!(session.state.can_transition_to(SessionState::Closed));
        session.state = SessionState::Closed;

        let removed = self
            .registry
            .disconnect(&session.identity.username, session.connection_id)
            .await;

        tracing::info!(
            username = %session.identity.username,
            connection_id = %session.connection_id,
            removed,
            "session closed"
        );
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::presence::EventReceiver;
    use domain::{MockIdentityVerifier, ServerEvent};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn verifier() -> MockIdentityVerifier {
        let mut verifier = MockIdentityVerifier::new();
        verifier.expect_verify().returning(|token| match token {
            "alice-token" => Ok(Identity::new("alice", "alice@example.com")),
            "bob-token" => Ok(Identity::new("bob", "bob@example.com")),
            _ => Err(AuthError::invalid_token("bad signature")),
        });
        verifier
    }

    fn manager() -> SessionManager {
        SessionManager::new(SessionManagerDependencies {
            verifier: Arc::new(verifier()),
            registry: Arc::new(PresenceRegistry::new()),
            match_gate: None,
            clock: Arc::new(SystemClock),
            policy: RoutingPolicy::default(),
        })
    }

    async fn connect(manager: &SessionManager, token: &str) -> (Session, EventReceiver) {
        let pending = manager.authenticate(Some(token)).await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        (manager.activate(pending, tx).await, rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let manager = manager();
        assert_eq!(
            manager.authenticate(None).await.unwrap_err(),
            AuthError::MissingToken
        );
        assert_eq!(
            manager.authenticate(Some("  ")).await.unwrap_err(),
            AuthError::MissingToken
        );
        assert!(manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let manager = manager();
        let err = manager.authenticate(Some("forged")).await.unwrap_err();
        assert_eq!(err.reason(), "Authentication error: Invalid token");
        assert!(manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_activate_registers_and_broadcasts() {
        let manager = manager();
        let (alice, mut alice_rx) = connect(&manager, "alice-token").await;
        assert_eq!(alice.state(), SessionState::Active);
        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerEvent::ConnectedUsers(vec!["alice".into()])]
        );

        let (_bob, _bob_rx) = connect(&manager, "bob-token").await;
        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerEvent::ConnectedUsers(vec!["alice".into(), "bob".into()])]
        );
    }

    #[tokio::test]
    async fn test_handle_frame_routes_message() {
        let manager = manager();
        let (alice, mut alice_rx) = connect(&manager, "alice-token").await;
        let (_bob, mut bob_rx) = connect(&manager, "bob-token").await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let frame = json!({
            "event": "sendMessage",
            "data": {"recipientUsername": "bob", "message": "hi"}
        })
        .to_string();
        manager.handle_frame(&alice, &frame).await;

        match drain(&mut bob_rx).as_slice() {
            [ServerEvent::NewMessage(message)] => {
                assert_eq!(message.sender_username, "alice");
                assert_eq!(message.message, "hi");
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(matches!(
            drain(&mut alice_rx).as_slice(),
            [ServerEvent::MessageSent(receipt)] if receipt.delivered
        ));
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_frames_dropped() {
        let manager = manager();
        let (alice, mut alice_rx) = connect(&manager, "alice-token").await;
        drain(&mut alice_rx);

        manager.handle_frame(&alice, "not json").await;
        manager
            .handle_frame(&alice, r#"{"event":"typing","data":{"recipientUsername":"bob"}}"#)
            .await;
        manager
            .handle_frame(&alice, r#"{"event":"wave","data":{}}"#)
            .await;

        assert!(drain(&mut alice_rx).is_empty());
        assert!(manager.registry().is_online("alice").await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_broadcasts() {
        let manager = manager();
        let (mut alice, _alice_rx) = connect(&manager, "alice-token").await;
        let (_bob, mut bob_rx) = connect(&manager, "bob-token").await;
        drain(&mut bob_rx);

        assert!(manager.close(&mut alice).await);
        assert_eq!(alice.state(), SessionState::Closed);
        assert_eq!(
            drain(&mut bob_rx),
            vec![ServerEvent::ConnectedUsers(vec!["bob".into()])]
        );

        assert!(!manager.close(&mut alice).await);
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_closing_replaced_session_keeps_new_entry() {
        let manager = manager();
        let (mut first, _first_rx) = connect(&manager, "alice-token").await;
        let (second, mut second_rx) = connect(&manager, "alice-token").await;
        drain(&mut second_rx);

        assert!(!manager.close(&mut first).await);
        let entry = manager.registry().lookup("alice").await.unwrap();
        assert_eq!(entry.connection_id, second.connection_id);
        assert!(drain(&mut second_rx).is_empty());
    }

    #[tokio::test]
    async fn test_closed_session_ignores_events() {
        let manager = manager();
        let (mut alice, _alice_rx) = connect(&manager, "alice-token").await;
        let (_bob, mut bob_rx) = connect(&manager, "bob-token").await;
        manager.close(&mut alice).await;
        drain(&mut bob_rx);

        manager
            .handle_frame(
                &alice,
                r#"{"event":"typing","data":{"recipientUsername":"bob","isTyping":true}}"#,
            )
            .await;
        assert!(drain(&mut bob_rx).is_empty());
    }
}
