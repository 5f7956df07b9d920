//! WebSocket 传输
//!
//! 维持到实时服务的连接：断线后按 [`ReconnectPolicy`] 重连，
//! 收到的服务器事件转换成 [`TimelineEvent`] 交给调用方归约。

use domain::{ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::backoff::ReconnectPolicy;
use crate::error::ClientError;
use crate::timeline::{DisconnectReason, TimelineEvent};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 例如 `ws://127.0.0.1:3000/ws`
    pub endpoint: String,
    pub token: String,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// 握手地址，令牌按查询参数编码
    pub fn url(&self) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

/// 单次连接的结束方式
#[derive(Debug)]
enum SessionEnd {
    Rejected(String),
    ServerClosed,
    TransportLost,
    ClientClosed,
    /// 事件接收方已释放
    ListenerGone,
}

/// 实时客户端
///
/// 后台任务持有连接；`send` 把事件放入出站队列，连接建立后依次写出。
pub struct RealtimeClient {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    task: JoinHandle<Result<(), ClientError>>,
}

impl RealtimeClient {
    pub fn spawn(config: ClientConfig, events: mpsc::UnboundedSender<TimelineEvent>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(config, outbound_rx, events));
        Self { outbound, task }
    }

    /// 出站队列，可交给 [`crate::TypingDebouncer`] 共用
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientEvent> {
        self.outbound.clone()
    }

    pub fn send(&self, event: ClientEvent) -> Result<(), ClientError> {
        self.outbound
            .send(event)
            .map_err(|_| ClientError::NotConnected)
    }

    /// 关闭出站队列并等待后台任务结束
    ///
    /// 其他持有 [`Self::sender`] 克隆的地方也释放后，连接才会关闭。
    pub async fn close(self) -> Result<(), ClientError> {
        drop(self.outbound);
        match self.task.await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "realtime client task failed");
                Ok(())
            }
        }
    }

    /// 等待后台任务结束（握手被拒绝、重连耗尽或服务器关闭）
    pub async fn finished(self) -> Result<(), ClientError> {
        let Self { outbound, task } = self;
        let result = task.await;
        drop(outbound);
        match result {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "realtime client task failed");
                Ok(())
            }
        }
    }
}

async fn run(
    config: ClientConfig,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    events: mpsc::UnboundedSender<TimelineEvent>,
) -> Result<(), ClientError> {
    let url = match config.url() {
        Ok(url) => url,
        Err(err) => {
            emit(&events, TimelineEvent::ConnectFailed(err.to_string()));
            return Err(err);
        }
    };
    let mut failures = 0u32;

    loop {
        if !emit(&events, TimelineEvent::Connecting) {
            return Ok(());
        }

        match connect_async(url.as_str()).await {
            Ok((ws, _response)) => {
                let (end, established) = session(ws, &mut outbound, &events).await;
                if established {
                    failures = 0;
                }

                let reason = match end {
                    SessionEnd::Rejected(reason) => {
                        tracing::warn!(reason = %reason, "handshake rejected");
                        emit(&events, TimelineEvent::ConnectFailed(reason.clone()));
                        return Err(ClientError::Rejected(reason));
                    }
                    SessionEnd::ListenerGone => {
                        tracing::debug!("timeline listener dropped, closing realtime client");
                        return Ok(());
                    }
                    SessionEnd::ServerClosed => DisconnectReason::ServerClosed,
                    SessionEnd::ClientClosed => DisconnectReason::ClientClosed,
                    SessionEnd::TransportLost => DisconnectReason::TransportLost,
                };

                let listening = emit(&events, TimelineEvent::Disconnected(reason));
                if !listening || reason != DisconnectReason::TransportLost {
                    return Ok(());
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, endpoint = %config.endpoint, "websocket connect failed");
            }
        }

        failures += 1;
        if !config.reconnect.should_retry(failures) {
            let err = ClientError::ReconnectExhausted(failures);
            emit(&events, TimelineEvent::ConnectFailed(err.to_string()));
            return Err(err);
        }

        let delay = config.reconnect.delay_at(failures);
        tracing::info!(attempt = failures, delay_ms = delay.as_millis() as u64, "reconnecting");
        tokio::time::sleep(delay).await;
    }
}

/// 交给调用方，返回接收方是否仍在
fn emit(events: &mpsc::UnboundedSender<TimelineEvent>, event: TimelineEvent) -> bool {
    events.send(event).is_ok()
}

/// 运行一次连接，返回结束方式以及是否成功建立过会话
async fn session(
    ws: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
    events: &mpsc::UnboundedSender<TimelineEvent>,
) -> (SessionEnd, bool) {
    let (mut sink, mut stream) = ws.split();
    // 服务器的第一个事件决定握手结果：connect_error 或在线名单
    let mut established = false;

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match ServerEvent::from_json(text.as_str()) {
                    Ok(ServerEvent::ConnectError(reason)) => {
                        return (SessionEnd::Rejected(reason), established);
                    }
                    Ok(event) => {
                        let connected = established || emit(events, TimelineEvent::Connected);
                        established = true;
                        if !connected || !emit(events, TimelineEvent::Server(event)) {
                            let _ = sink.send(Message::Close(None)).await;
                            return (SessionEnd::ListenerGone, established);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "ignoring undecodable server frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "server closed the connection");
                    let end = if established {
                        SessionEnd::ServerClosed
                    } else {
                        SessionEnd::TransportLost
                    };
                    return (end, established);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "websocket read failed");
                    return (SessionEnd::TransportLost, established);
                }
                None => return (SessionEnd::TransportLost, established),
            },
            outgoing = outbound.recv() => match outgoing {
                Some(event) => {
                    let json = match event.to_json() {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize client event");
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(json.into())).await {
                        tracing::warn!(error = %err, "websocket write failed");
                        return (SessionEnd::TransportLost, established);
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return (SessionEnd::ClientClosed, established);
                }
            },
        }
    }
}
