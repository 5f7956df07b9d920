//! 应用层实现。
//!
//! 实时核心的用例服务：在线状态注册表、连接会话管理、
//! 私聊消息路由、输入状态转发，以及供 REST 使用的聊天资格查询。

pub mod clock;
pub mod eligibility;
pub mod error;
pub mod presence;
pub mod router;
pub mod session;
pub mod typing;

pub use clock::{Clock, SystemClock};
pub use eligibility::ChatEligibilityService;
pub use error::ApplicationError;
pub use presence::{EventReceiver, EventSender, PresenceEntry, PresenceRegistry, Registration};
pub use router::{MessageRouter, RouteOutcome, RoutingPolicy};
pub use session::{AuthenticatedSession, Session, SessionManager, SessionManagerDependencies};
pub use typing::{TypingNotifier, TypingOutcome};
