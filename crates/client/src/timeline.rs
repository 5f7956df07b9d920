//! 客户端聊天状态
//!
//! 纯状态机：传输层把收到的事件转换成 [`TimelineEvent`]，
//! 由 [`ChatTimeline::apply`] 逐个归约，界面只读取结果。

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use domain::{ChatMessage, ClientEvent, DeliveryReceipt, SendMessagePayload, ServerEvent};
use rand::Rng;

use crate::error::ClientError;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// 断开原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// 服务器主动关闭
    ServerClosed,
    /// 传输中断，客户端会尝试重连
    TransportLost,
    /// 客户端主动关闭
    ClientClosed,
}

impl DisconnectReason {
    /// 显示给用户的提示
    pub fn message(&self) -> Option<&'static str> {
        match self {
            DisconnectReason::ServerClosed => Some("You were disconnected by the server"),
            DisconnectReason::TransportLost => Some("Connection lost. Attempting to reconnect..."),
            DisconnectReason::ClientClosed => None,
        }
    }
}

/// 消息的投递状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// 别人发来的消息
    Received,
    /// 本地乐观副本，尚未收到回执
    Pending,
    /// 回执确认接收者在线
    Sent,
    /// 回执表明未投递（接收者不在线或被服务器拒绝），或断开连接时仍未确认
    NotDelivered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineMessage {
    pub id: String,
    pub message: ChatMessage,
    pub delivered: bool,
    /// 本地发出的乐观副本
    pub local: bool,
    pub acknowledged: bool,
}

impl TimelineMessage {
    pub fn status(&self) -> DeliveryStatus {
        match (self.local, self.acknowledged, self.delivered) {
            (false, _, _) => DeliveryStatus::Received,
            (true, false, _) => DeliveryStatus::Pending,
            (true, true, true) => DeliveryStatus::Sent,
            (true, true, false) => DeliveryStatus::NotDelivered,
        }
    }
}

/// 归约器的输入
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    Connecting,
    Connected,
    /// 握手被拒绝或重连次数耗尽
    ConnectFailed(String),
    Disconnected(DisconnectReason),
    /// 注销：清空全部状态
    LoggedOut,
    Server(ServerEvent),
}

/// 单个用户视角下的聊天状态
#[derive(Debug, Clone)]
pub struct ChatTimeline {
    username: String,
    status: ConnectionStatus,
    messages: Vec<TimelineMessage>,
    seen_ids: HashSet<String>,
    typing: HashMap<String, bool>,
    roster: Vec<String>,
    last_error: Option<String>,
}

impl ChatTimeline {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            status: ConnectionStatus::Disconnected,
            messages: Vec::new(),
            seen_ids: HashSet::new(),
            typing: HashMap::new(),
            roster: Vec::new(),
            last_error: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn messages(&self) -> &[TimelineMessage] {
        &self.messages
    }

    /// 与 `peer` 的会话，按到达顺序
    pub fn conversation<'a>(&'a self, peer: &'a str) -> impl Iterator<Item = &'a TimelineMessage> + 'a {
        self.messages
            .iter()
            .filter(move |entry| entry.message.is_between(&self.username, peer))
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.roster.iter().any(|name| name == username)
    }

    pub fn is_typing(&self, username: &str) -> bool {
        self.typing.get(username).copied().unwrap_or(false)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// 归约一个事件，返回状态是否改变
    pub fn apply(&mut self, event: TimelineEvent) -> bool {
        match event {
            TimelineEvent::Connecting => {
                self.status = ConnectionStatus::Connecting;
                true
            }
            TimelineEvent::Connected => {
                self.status = ConnectionStatus::Connected;
                self.last_error = None;
                true
            }
            TimelineEvent::ConnectFailed(reason) => {
                self.status = ConnectionStatus::Disconnected;
                self.last_error = Some(ClientError::Rejected(reason).to_string());
                true
            }
            TimelineEvent::Disconnected(reason) => {
                self.status = ConnectionStatus::Disconnected;
                // 名单和输入状态在重连后由服务器重新下发，消息保留
                self.roster.clear();
                self.typing.clear();
                // 断开前未确认的副本不会再收到回执
                self.abandon_pending();
                if let Some(message) = reason.message() {
                    self.last_error = Some(message.to_string());
                }
                true
            }
            TimelineEvent::LoggedOut => {
                let username = std::mem::take(&mut self.username);
                *self = Self::new(username);
                true
            }
            TimelineEvent::Server(event) => self.apply_server_event(event),
        }
    }

    fn apply_server_event(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::NewMessage(message) => self.receive(message),
            ServerEvent::MessageSent(receipt) => self.acknowledge(receipt),
            ServerEvent::UserTyping(indicator) => {
                self.typing
                    .insert(indicator.sender_username, indicator.is_typing);
                true
            }
            ServerEvent::ConnectedUsers(users) => {
                self.roster = users;
                true
            }
            ServerEvent::ConnectError(reason) => {
                self.apply(TimelineEvent::ConnectFailed(reason))
            }
            // 被拒绝的消息随后仍有回执，这里只记录原因
            ServerEvent::Error(payload) => {
                self.last_error = Some(payload.message);
                true
            }
        }
    }

    fn receive(&mut self, mut message: ChatMessage) -> bool {
        let id = message
            .id
            .clone()
            .unwrap_or_else(|| inbound_message_id(&message));

        if !self.seen_ids.insert(id.clone()) {
            tracing::debug!(id = %id, "duplicate message discarded");
            return false;
        }

        message.id = Some(id.clone());
        self.messages.push(TimelineMessage {
            id,
            message,
            delivered: true,
            local: false,
            acknowledged: true,
        });
        true
    }

    /// 回执更新最早一条收件人和正文都相同、尚未确认的乐观副本
    fn acknowledge(&mut self, receipt: DeliveryReceipt) -> bool {
        let pending = self.messages.iter_mut().find(|entry| {
            entry.local
                && !entry.acknowledged
                && entry.message.recipient_username == receipt.message.recipient_username
                && entry.message.message == receipt.message.message
        });

        match pending {
            Some(entry) => {
                entry.acknowledged = true;
                entry.delivered = receipt.delivered;
                entry.message.timestamp = receipt.message.timestamp;
                true
            }
            None => {
                tracing::debug!(
                    recipient = %receipt.message.recipient_username,
                    "acknowledgement without matching optimistic copy"
                );
                false
            }
        }
    }

    fn abandon_pending(&mut self) {
        for entry in self
            .messages
            .iter_mut()
            .filter(|entry| entry.local && !entry.acknowledged)
        {
            entry.acknowledged = true;
            entry.delivered = false;
        }
    }

    /// 乐观发送：先在本地追加副本，再返回需要发出的事件
    ///
    /// 未连接时拒绝并记录错误。
    pub fn compose(
        &mut self,
        recipient_username: impl Into<String>,
        body: impl Into<String>,
        conversation_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ClientEvent, ClientError> {
        if !self.is_connected() {
            let err = ClientError::NotConnected;
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        let payload = SendMessagePayload {
            recipient_username: recipient_username.into(),
            message: body.into(),
            conversation_id,
        };

        let id = local_message_id(now);
        self.seen_ids.insert(id.clone());

        let mut message = ChatMessage::from_payload(self.username.clone(), payload.clone(), now);
        message.id = Some(id.clone());

        self.messages.push(TimelineMessage {
            id,
            message,
            delivered: false,
            local: true,
            acknowledged: false,
        });

        Ok(ClientEvent::SendMessage(payload))
    }
}

/// 本地乐观副本的标识：毫秒时间戳 + 随机后缀，均为 36 进制
pub fn local_message_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    format!("{}{}", to_base36(millis), random_suffix())
}

/// 服务器未提供标识时为入站消息合成一个
pub fn inbound_message_id(message: &ChatMessage) -> String {
    format!(
        "{}-{}-{}-{}",
        message.sender_username,
        message.recipient_username,
        message.timestamp.to_rfc3339(),
        random_suffix()
    )
}

fn random_suffix() -> String {
    to_base36(rand::rng().random::<u64>())
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
