use std::time::Duration;

/// 断线重连策略：固定次数，指数退避
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 首次连接之外最多重试的次数
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// 第 `attempt` 次重试前的等待时间（从 1 开始）
    pub fn delay_at(&self, attempt: u32) -> Duration {
        let exp = std::cmp::min(attempt.saturating_sub(1), 20);
        let factor = 1u32 << exp;
        self.base_delay.saturating_mul(factor)
    }

    /// 连续失败 `failures` 次后是否还应重试
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_attempts
    }
}
