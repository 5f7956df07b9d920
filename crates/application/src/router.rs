use std::sync::Arc;

use domain::{
    ChatMessage, DeliveryReceipt, ErrorPayload, MatchGate, SendMessagePayload, ServerEvent,
};

use crate::clock::Clock;
use crate::presence::{EventSender, PresenceRegistry};

/// 路由前的策略检查
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    /// 转发前是否确认双方互相喜欢
    pub enforce_match_gate: bool,
    /// 单条消息最大字符数
    pub max_message_length: usize,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            enforce_match_gate: false,
            max_message_length: 2000,
        }
    }
}

impl From<&config::RealtimeConfig> for RoutingPolicy {
    fn from(config: &config::RealtimeConfig) -> Self {
        Self {
            enforce_match_gate: config.enforce_match_gate,
            max_message_length: config.max_message_length,
        }
    }
}

/// 单次路由的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// 接收者在线，已投递
    Delivered,
    /// 接收者不在线，消息被丢弃
    RecipientOffline,
    /// 策略拒绝，发送者收到错误事件
    Rejected { code: &'static str },
}

/// 私聊消息路由器
///
/// 至多一次、尽力投递：接收者不在线就丢弃，不排队也不持久化。
/// 每个入站发送事件都会给发送者回一个 `messageSent` 回执，
/// `delivered` 表示消息是否已投递给在线的接收者。
/// 被策略拒绝时先回一个 `error` 事件，回执的 `delivered` 为 false。路由器不去重。
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<PresenceRegistry>,
    clock: Arc<dyn Clock>,
    match_gate: Option<Arc<dyn MatchGate>>,
    policy: RoutingPolicy,
}

impl MessageRouter {
    pub const INVALID_MESSAGE: &'static str = ErrorPayload::INVALID_MESSAGE;
    pub const NOT_MATCHED: &'static str = ErrorPayload::NOT_MATCHED;
    pub const MATCH_GATE_UNAVAILABLE: &'static str = ErrorPayload::MATCH_GATE_UNAVAILABLE;

    pub fn new(
        registry: Arc<PresenceRegistry>,
        clock: Arc<dyn Clock>,
        match_gate: Option<Arc<dyn MatchGate>>,
        policy: RoutingPolicy,
    ) -> Self {
        if policy.enforce_match_gate && match_gate.is_none() {
            tracing::warn!("match gate enforcement requested but no match gate configured; messages are routed unchecked");
        }
        Self {
            registry,
            clock,
            match_gate,
            policy,
        }
    }

    /// 路由一条消息
    ///
    /// `reply` 是发送者自己的连接通道，回执和错误只回到这里。
    pub async fn route(
        &self,
        sender_username: &str,
        reply: &EventSender,
        payload: SendMessagePayload,
    ) -> RouteOutcome {
        let rejection = match payload.validate(self.policy.max_message_length) {
            Err(err) => {
                tracing::debug!(sender = %sender_username, error = %err, "rejecting message");
                Some((Self::INVALID_MESSAGE, err.to_string()))
            }
            Ok(()) => self
                .check_match(sender_username, &payload.recipient_username)
                .await
                .map(|code| {
                    let reason = match code {
                        Self::NOT_MATCHED => {
                            format!("you are not matched with {}", payload.recipient_username)
                        }
                        _ => "unable to verify match, try again later".to_string(),
                    };
                    (code, reason)
                }),
        };

        let message = ChatMessage::from_payload(sender_username, payload, self.clock.now());

        // 被拒绝的消息同样回执，错误事件在回执之前说明原因
        if let Some((code, reason)) = rejection {
            Self::reply(reply, ServerEvent::error(code, reason));
            Self::reply(
                reply,
                ServerEvent::MessageSent(DeliveryReceipt {
                    message,
                    delivered: false,
                }),
            );
            return RouteOutcome::Rejected { code };
        }

        let delivered = match self.registry.lookup(&message.recipient_username).await {
            Some(recipient) => recipient.send(ServerEvent::NewMessage(message.clone())),
            None => false,
        };

        tracing::info!(
            sender = %message.sender_username,
            recipient = %message.recipient_username,
            delivered,
            "private message routed"
        );

        let outcome = if delivered {
            RouteOutcome::Delivered
        } else {
            RouteOutcome::RecipientOffline
        };

        Self::reply(
            reply,
            ServerEvent::MessageSent(DeliveryReceipt { message, delivered }),
        );

        outcome
    }

    /// 需要拒绝时返回错误码
    async fn check_match(&self, sender: &str, recipient: &str) -> Option<&'static str> {
        if !self.policy.enforce_match_gate {
            return None;
        }
        let gate = self.match_gate.as_ref()?;

        match gate.is_mutual_like(sender, recipient).await {
            Ok(true) => None,
            Ok(false) => {
                tracing::info!(sender = %sender, recipient = %recipient, "message between unmatched users dropped");
                Some(Self::NOT_MATCHED)
            }
            Err(err) => {
                tracing::error!(sender = %sender, recipient = %recipient, error = %err, "match gate lookup failed");
                Some(Self::MATCH_GATE_UNAVAILABLE)
            }
        }
    }

    fn reply(reply: &EventSender, event: ServerEvent) {
        if reply.send(event).is_err() {
            tracing::debug!("sender connection already closed, dropping reply");
        }
    }
}
