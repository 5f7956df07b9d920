//! 在线状态相关实体

use serde::{Deserialize, Serialize};
use std::fmt;

/// 连接标识
///
/// 由在线状态注册表按连接顺序单调分配，同一进程内不会重复。
/// 注销时以它做比较，避免旧连接误删新连接的在线记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// 单个实时连接的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// 传输层已建立，尚未校验身份
    Connecting,
    /// 身份校验通过，尚未登记在线状态
    Authenticated,
    /// 已登记在线并可收发事件
    Active,
    /// 已关闭（终态）
    Closed,
}

impl SessionState {
    /// 状态机允许的迁移
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticated)
                | (Connecting, Closed)
                | (Authenticated, Active)
                | (Authenticated, Closed)
                | (Active, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}
