use std::sync::Arc;
use std::time::Duration;

use domain::{ClientEvent, TypingPayload};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// 停止输入多久后发送 `isTyping=false`
pub const TYPING_IDLE: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct Burst {
    recipient: String,
    deadline: Instant,
}

/// 输入状态去抖
///
/// 一段连续输入只发送一次 `isTyping=true`，空闲超时后发送一次 `isTyping=false`。
/// 计时器由客户端持有，`cancel` 或 drop 时直接丢弃，不会补发过期的停止信号。
pub struct TypingDebouncer {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    idle: Duration,
    burst: Arc<Mutex<Option<Burst>>>,
    timer: Option<JoinHandle<()>>,
}

impl TypingDebouncer {
    pub fn new(outbound: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self::with_idle(outbound, TYPING_IDLE)
    }

    pub fn with_idle(outbound: mpsc::UnboundedSender<ClientEvent>, idle: Duration) -> Self {
        Self {
            outbound,
            idle,
            burst: Arc::new(Mutex::new(None)),
            timer: None,
        }
    }

    /// 用户在给 `recipient` 的输入框里按键
    pub async fn keystroke(&mut self, recipient: &str) {
        let deadline = Instant::now() + self.idle;
        {
            let mut burst = self.burst.lock().await;
            match burst.as_mut() {
                Some(active) if active.recipient == recipient => {
                    active.deadline = deadline;
                    return;
                }
                Some(active) => emit(&self.outbound, &active.recipient, false),
                None => {}
            }
            *burst = Some(Burst {
                recipient: recipient.to_string(),
                deadline,
            });
        }

        emit(&self.outbound, recipient, true);
        self.restart_timer();
    }

    /// 立即结束当前输入（例如消息已发出）
    pub async fn stop(&mut self) {
        self.abort_timer();
        if let Some(active) = self.burst.lock().await.take() {
            emit(&self.outbound, &active.recipient, false);
        }
    }

    /// 丢弃计时器，不发送停止信号
    pub async fn cancel(&mut self) {
        self.abort_timer();
        self.burst.lock().await.take();
    }

    pub async fn is_active(&self) -> bool {
        self.burst.lock().await.is_some()
    }

    fn restart_timer(&mut self) {
        self.abort_timer();

        let burst = self.burst.clone();
        let outbound = self.outbound.clone();
        self.timer = Some(tokio::spawn(async move {
            loop {
                let deadline = match burst.lock().await.as_ref() {
                    Some(active) => active.deadline,
                    None => return,
                };
                sleep_until(deadline).await;

                let mut guard = burst.lock().await;
                let expired = matches!(guard.as_ref(), Some(active) if active.deadline <= Instant::now());
                if expired {
                    if let Some(active) = guard.take() {
                        emit(&outbound, &active.recipient, false);
                    }
                    return;
                }
                if guard.is_none() {
                    return;
                }
            }
        }));
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for TypingDebouncer {
    fn drop(&mut self) {
        self.abort_timer();
    }
}

fn emit(outbound: &mpsc::UnboundedSender<ClientEvent>, recipient: &str, is_typing: bool) {
    let event = ClientEvent::Typing(TypingPayload {
        recipient_username: recipient.to_string(),
        is_typing,
    });
    if outbound.send(event).is_err() {
        tracing::debug!("transport closed, typing signal dropped");
    }
}
