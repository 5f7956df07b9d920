use application::{AuthenticatedSession, EventReceiver, Session, SessionManager};
use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket};
use domain::{AuthError, ServerEvent};
use futures_util::{stream::SplitStream, SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;

/// WebSocket 连接
///
/// 一个连接对应一个写任务：出站事件（路由器、输入状态、名单广播）
/// 和 pong 回应都经由写任务串行写入，保证每个连接内的顺序。
pub struct WebSocketConnection {
    socket: WebSocket,
    manager: std::sync::Arc<SessionManager>,
    session: Session,
    outbound: EventReceiver,
}

impl WebSocketConnection {
    /// 登记在线状态，之后的名单广播会先进入出站队列，等写任务启动后发出
    pub async fn open(socket: WebSocket, state: AppState, pending: AuthenticatedSession) -> Self {
        let (event_tx, outbound) = mpsc::unbounded_channel();
        let manager = state.session_manager.clone();
        let session = manager.activate(pending, event_tx).await;

        tracing::info!(
            username = %session.username(),
            connection_id = %session.connection_id,
            "WebSocket 连接已建立"
        );

        Self {
            socket,
            manager,
            session,
            outbound,
        }
    }

    /// 握手认证失败：发送 `connect_error` 和携带原因的关闭帧
    pub async fn reject(mut socket: WebSocket, error: AuthError) {
        let reason = error.reason();

        match ServerEvent::ConnectError(reason.clone()).to_json() {
            Ok(json) => {
                if socket.send(WsMessage::Text(json.into())).await.is_err() {
                    tracing::debug!("client left before connect_error was sent");
                    return;
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize connect_error"),
        }

        let frame = CloseFrame {
            code: close_code::POLICY,
            reason: reason.into(),
        };
        if socket.send(WsMessage::Close(Some(frame))).await.is_err() {
            tracing::debug!("client left before close frame was sent");
        }
    }

    /// 运行连接主循环，直到任意一方断开
    pub async fn run(self) {
        let Self {
            socket,
            manager,
            mut session,
            mut outbound,
        } = self;

        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 写任务：统一处理所有对 WebSocket sender 的写操作
        let mut send_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    Some(cmd) = cmd_rx.recv() => match cmd {
                        WsCommand::SendPong(data) => WsMessage::Pong(data.into()),
                    },
                    Some(event) = outbound.recv() => match event.to_json() {
                        Ok(json) => WsMessage::Text(json.into()),
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize websocket payload");
                            continue;
                        }
                    },
                    else => break,
                };

                if sender.send(message).await.is_err() {
                    tracing::debug!("WebSocket 写入失败，连接已断开");
                    break;
                }
            }
            tracing::debug!("WebSocket发送任务结束");
        });

        tokio::select! {
            _ = &mut send_task => {
                tracing::debug!("WebSocket发送任务完成");
            }
            _ = Self::receive_loop(&manager, &session, &mut incoming, &cmd_tx) => {
                tracing::debug!("WebSocket接收任务完成");
            }
        }

        manager.close(&mut session).await;
        send_task.abort();

        tracing::info!(
            username = %session.username(),
            connection_id = %session.connection_id,
            "WebSocket连接已断开，在线状态已清理"
        );
    }

    async fn receive_loop(
        manager: &SessionManager,
        session: &Session,
        incoming: &mut SplitStream<WebSocket>,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) {
        while let Some(message) = incoming.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(error = %err, "WebSocket 读取失败");
                    break;
                }
            };

            match message {
                WsMessage::Text(text) => manager.handle_frame(session, text.as_str()).await,
                WsMessage::Close(_) => {
                    tracing::debug!(connection_id = %session.connection_id, "WebSocket收到关闭消息");
                    break;
                }
                WsMessage::Ping(data) => {
                    if cmd_tx.send(WsCommand::SendPong(data.to_vec())).await.is_err() {
                        tracing::warn!("Failed to send pong command");
                        break;
                    }
                }
                WsMessage::Pong(_) => {}
                WsMessage::Binary(_) => {
                    tracing::debug!(connection_id = %session.connection_id, "ignoring binary frame");
                }
            }
        }
    }
}

/// WebSocket 写操作命令
#[derive(Debug)]
enum WsCommand {
    SendPong(Vec<u8>),
}
