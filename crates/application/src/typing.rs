use std::sync::Arc;

use domain::{ServerEvent, TypingIndicator, TypingPayload};

use crate::presence::PresenceRegistry;

/// 输入状态转发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingOutcome {
    Forwarded,
    RecipientOffline,
    /// 发给自己的信号直接丢弃
    SelfSignal,
}

/// 输入状态转发
///
/// 无状态、无回执。接收者不在线时静默丢弃。
#[derive(Clone)]
pub struct TypingNotifier {
    registry: Arc<PresenceRegistry>,
}

impl TypingNotifier {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    pub async fn notify(&self, sender_username: &str, payload: TypingPayload) -> TypingOutcome {
        if payload.recipient_username == sender_username {
            return TypingOutcome::SelfSignal;
        }

        let Some(recipient) = self.registry.lookup(&payload.recipient_username).await else {
            return TypingOutcome::RecipientOffline;
        };

        let indicator = TypingIndicator {
            sender_username: sender_username.to_string(),
            is_typing: payload.is_typing,
        };

        if recipient.send(ServerEvent::UserTyping(indicator)) {
            tracing::trace!(
                sender = %sender_username,
                recipient = %payload.recipient_username,
                is_typing = payload.is_typing,
                "typing forwarded"
            );
            TypingOutcome::Forwarded
        } else {
            TypingOutcome::RecipientOffline
        }
    }
}
