use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use domain::{ConnectionId, Identity, ServerEvent};
use tokio::sync::{mpsc, RwLock};

/// 单个连接的出站事件通道（即该连接的私有地址）
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// 在线记录
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub username: String,
    pub email: String,
    pub connection_id: ConnectionId,
    pub connected_at: DateTime<Utc>,
    sender: EventSender,
}

impl PresenceEntry {
    /// 投递事件到该连接，连接的写任务已结束时返回 false
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// 登记结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub connection_id: ConnectionId,
    /// 被顶替的旧连接（同一用户名后连接者生效）
    pub replaced: Option<ConnectionId>,
}

/// 进程内的在线状态注册表
///
/// 用户名 -> 当前连接。每个用户名最多一条记录，新连接直接覆盖旧记录，
/// 旧连接不会被主动关闭。注销按连接标识比较后删除，
/// 旧连接断开时不会误删新连接的记录。
///
/// 登记/注销与在线名单广播在同一个写锁临界区内完成，
/// 出站通道是无界的，临界区内没有挂起点。
pub struct PresenceRegistry {
    entries: RwLock<HashMap<String, PresenceEntry>>,
    next_connection_id: AtomicU64,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(0),
        }
    }

    fn allocate_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// 登记（或覆盖）用户的在线记录，不广播
    pub async fn register(
        &self,
        identity: &Identity,
        sender: EventSender,
        connected_at: DateTime<Utc>,
    ) -> Registration {
        let mut entries = self.entries.write().await;
        self.insert_locked(&mut entries, identity, sender, connected_at)
    }

    /// 仅当记录仍属于 `connection_id` 时删除，不广播
    pub async fn unregister(&self, username: &str, connection_id: ConnectionId) -> bool {
        let mut entries = self.entries.write().await;
        Self::remove_locked(&mut entries, username, connection_id)
    }

    /// 登记在线状态并向所有连接广播最新名单
    pub async fn connect(
        &self,
        identity: &Identity,
        sender: EventSender,
        connected_at: DateTime<Utc>,
    ) -> Registration {
        let mut entries = self.entries.write().await;
        let registration = self.insert_locked(&mut entries, identity, sender, connected_at);
        Self::broadcast_roster_locked(&entries);
        registration
    }

    /// 注销在线状态并向剩余连接广播最新名单
    ///
    /// 记录已被新连接顶替时什么也不做，返回 false。
    pub async fn disconnect(&self, username: &str, connection_id: ConnectionId) -> bool {
        let mut entries = self.entries.write().await;
        let removed = Self::remove_locked(&mut entries, username, connection_id);
        if removed {
            Self::broadcast_roster_locked(&entries);
        }
        removed
    }

    pub async fn lookup(&self, username: &str) -> Option<PresenceEntry> {
        let entries = self.entries.read().await;
        entries.get(username).cloned()
    }

    pub async fn is_online(&self, username: &str) -> bool {
        self.entries.read().await.contains_key(username)
    }

    pub async fn list_usernames(&self) -> BTreeSet<String> {
        let entries = self.entries.read().await;
        entries.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn insert_locked(
        &self,
        entries: &mut HashMap<String, PresenceEntry>,
        identity: &Identity,
        sender: EventSender,
        connected_at: DateTime<Utc>,
    ) -> Registration {
        let connection_id = self.allocate_connection_id();
        let entry = PresenceEntry {
            username: identity.username.clone(),
            email: identity.email.clone(),
            connection_id,
            connected_at,
            sender,
        };

        let replaced = entries
            .insert(identity.username.clone(), entry)
            .map(|previous| previous.connection_id);

        match replaced {
            Some(previous) => tracing::warn!(
                username = %identity.username,
                connection_id = %connection_id,
                replaced = %previous,
                "在线记录被新连接顶替"
            ),
            None => tracing::info!(
                username = %identity.username,
                connection_id = %connection_id,
                "用户上线"
            ),
        }

        Registration {
            connection_id,
            replaced,
        }
    }

    fn remove_locked(
        entries: &mut HashMap<String, PresenceEntry>,
        username: &str,
        connection_id: ConnectionId,
    ) -> bool {
        let current = entries.get(username).map(|entry| entry.connection_id);
        match current {
            Some(current) if current == connection_id => {
                entries.remove(username);
                tracing::info!(username = %username, connection_id = %connection_id, "用户下线");
                true
            }
            Some(current) => {
                tracing::debug!(
                    username = %username,
                    connection_id = %connection_id,
                    current = %current,
                    "stale connection closed, keeping newer presence entry"
                );
                false
            }
            None => false,
        }
    }

    fn broadcast_roster_locked(entries: &HashMap<String, PresenceEntry>) {
        let mut roster: Vec<String> = entries.keys().cloned().collect();
        roster.sort();

        let mut failed = 0usize;
        for entry in entries.values() {
            if !entry.send(ServerEvent::ConnectedUsers(roster.clone())) {
                failed += 1;
            }
        }

        tracing::debug!(online = roster.len(), failed, "broadcast connected users");
    }
}
