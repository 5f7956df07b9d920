#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use config::AppConfig;
use domain::Identity;
use futures_util::{SinkExt, StreamExt};
use infrastructure::{InMemoryMatchGate, InMemoryUserDirectory, Infrastructure};
use serde_json::{json, Value};
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// 使用内存适配器启动的测试服务器
pub struct TestServer {
    pub addr: SocketAddr,
    pub infrastructure: Infrastructure,
    pub directory: Arc<InMemoryUserDirectory>,
    pub match_gate: Arc<InMemoryMatchGate>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::default();
        config.jwt.secret = "test-secret-key-with-at-least-32-characters".to_string();
        configure(&mut config);

        let directory = Arc::new(InMemoryUserDirectory::new());
        let match_gate = Arc::new(InMemoryMatchGate::new());
        let infrastructure =
            Infrastructure::with_adapters(&config, directory.clone(), match_gate.clone());

        let state = AppState::from_infrastructure(&config, &infrastructure);
        let app = router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            infrastructure,
            directory,
            match_gate,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub async fn add_user(&self, username: &str) {
        self.directory
            .insert(Identity::new(username, format!("{}@example.com", username)))
            .await;
    }

    pub fn token(&self, username: &str) -> String {
        let email = format!("{}@example.com", username);
        self.infrastructure
            .verifier
            .generate_token(username, Some(&email))
            .expect("token")
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws?token={}", self.addr, token),
            None => format!("ws://{}/ws", self.addr),
        }
    }

    /// 注册用户并建立已认证的连接
    pub async fn connect(&self, username: &str) -> WsStream {
        self.add_user(username).await;
        let (ws, _) = connect_async(self.ws_url(Some(&self.token(username))))
            .await
            .expect("websocket connect");
        ws
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// 读取下一条事件帧，返回 `{"event", "data"}`；连接关闭时返回 None
pub async fn next_event(ws: &mut WsStream) -> Option<Value> {
    loop {
        let message = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for websocket event")?;
        match message.ok()? {
            TungsteniteMessage::Text(text) => {
                return Some(serde_json::from_str(text.as_str()).expect("event json"));
            }
            TungsteniteMessage::Close(_) => return None,
            _ => continue,
        }
    }
}

/// 跳过其他事件，直到收到指定名称的事件
pub async fn expect_event(ws: &mut WsStream, name: &str) -> Value {
    loop {
        let event = next_event(ws)
            .await
            .unwrap_or_else(|| panic!("connection closed while waiting for {}", name));
        if event["event"] == name {
            return event["data"].clone();
        }
    }
}

/// 等待在线名单变为期望值
pub async fn wait_for_roster(ws: &mut WsStream, expected: &[&str]) {
    loop {
        let roster = expect_event(ws, "connectedUsers").await;
        let roster: Vec<String> = serde_json::from_value(roster).expect("roster");
        if roster == expected {
            return;
        }
    }
}

/// 在给定时间内没有任何指定名称的事件到达
pub async fn assert_no_event(ws: &mut WsStream, name: &str, within: Duration) {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return;
        }
        match timeout(remaining, ws.next()).await {
            Err(_) => return,
            Ok(None) => return,
            Ok(Some(Ok(TungsteniteMessage::Text(text)))) => {
                let event: Value = serde_json::from_str(text.as_str()).expect("event json");
                assert_ne!(event["event"], name, "unexpected event {}", event);
            }
            Ok(Some(_)) => continue,
        }
    }
}

pub async fn send_event(ws: &mut WsStream, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data }).to_string();
    ws.send(TungsteniteMessage::Text(frame.into()))
        .await
        .expect("send frame");
}
