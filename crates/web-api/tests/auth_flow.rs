mod support;

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message as TungsteniteMessage};

use config::AppConfig;
use infrastructure::Infrastructure;
use serde_json::json;
use tokio::net::TcpListener;
use web_api::{router, AppState};

use support::{expect_event, next_event, send_event, wait_for_roster, TestServer};

async fn rejected_with(server: &TestServer, url: String, reason: &str) {
    let (mut ws, _) = connect_async(url).await.expect("upgrade still succeeds");

    let event = next_event(&mut ws).await.expect("connect_error event");
    assert_eq!(event["event"], "connect_error");
    assert_eq!(event["data"], reason);

    // 随后是携带原因的关闭帧
    loop {
        match ws.next().await {
            Some(Ok(TungsteniteMessage::Close(Some(frame)))) => {
                assert_eq!(frame.reason.as_str(), reason);
                break;
            }
            Some(Ok(TungsteniteMessage::Close(None))) | None | Some(Err(_)) => {
                panic!("expected close frame with reason")
            }
            Some(Ok(_)) => continue,
        }
    }

    let health: Value = Client::new()
        .get(server.http_url("/api/health"))
        .send()
        .await
        .expect("health")
        .json()
        .await
        .expect("health json");
    assert_eq!(health["socketConnections"], 0);
}

#[tokio::test]
async fn handshake_without_token_rejected() {
    let server = TestServer::start().await;
    rejected_with(
        &server,
        server.ws_url(None),
        "Authentication error: No token provided",
    )
    .await;
}

#[tokio::test]
async fn handshake_with_invalid_token_rejected() {
    let server = TestServer::start().await;
    rejected_with(
        &server,
        server.ws_url(Some("not-a-jwt")),
        "Authentication error: Invalid token",
    )
    .await;
}

#[tokio::test]
async fn handshake_for_unknown_user_rejected() {
    let server = TestServer::start().await;
    let token = server.token("ghost");
    rejected_with(
        &server,
        server.ws_url(Some(&token)),
        "Authentication error: Invalid token",
    )
    .await;
}

#[tokio::test]
async fn directory_check_can_be_disabled() {
    let server = TestServer::start_with(|config| config.realtime.verify_user_exists = false).await;
    let token = server.token("walk-in");

    let (mut ws, _) = connect_async(server.ws_url(Some(&token)))
        .await
        .expect("connect");
    wait_for_roster(&mut ws, &["walk-in"]).await;
}

#[tokio::test]
async fn default_config_without_database_accepts_tokens() {
    // 与二进制入口相同的组装方式：默认配置、无数据库
    let config = AppConfig::default();
    let infrastructure = Infrastructure::connect(&config).await.expect("infrastructure");
    let app = router(AppState::from_infrastructure(&config, &infrastructure));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.ok();
    });

    let token = |username: &str| {
        infrastructure
            .verifier
            .generate_token(username, Some(&format!("{username}@example.com")))
            .expect("token")
    };
    let url = |token: String| format!("ws://{addr}/ws?token={token}");

    let (mut alice, _) = connect_async(url(token("alice"))).await.expect("alice connects");
    let first = next_event(&mut alice).await.expect("first frame");
    assert_eq!(first["event"], "connectedUsers");

    let (mut bob, _) = connect_async(url(token("bob"))).await.expect("bob connects");
    wait_for_roster(&mut alice, &["alice", "bob"]).await;
    wait_for_roster(&mut bob, &["alice", "bob"]).await;

    send_event(
        &mut alice,
        "sendMessage",
        json!({"recipientUsername": "bob", "message": "hello"}),
    )
    .await;
    let received = expect_event(&mut bob, "newMessage").await;
    assert_eq!(received["senderUsername"], "alice");
    let ack = expect_event(&mut alice, "messageSent").await;
    assert_eq!(ack["delivered"], true);
}

#[tokio::test]
async fn chat_eligibility_reflects_match_gate() {
    let server = TestServer::start().await;
    server.add_user("alice").await;
    server.match_gate.add_match("alice", "bob").await;
    let client = Client::new();

    let matched: Value = client
        .get(server.http_url("/api/v1/chat/eligibility/bob"))
        .bearer_auth(server.token("alice"))
        .send()
        .await
        .expect("eligibility")
        .json()
        .await
        .expect("eligibility json");
    assert_eq!(matched["username"], "bob");
    assert_eq!(matched["matched"], true);

    let unmatched: Value = client
        .get(server.http_url("/api/v1/chat/eligibility/dave"))
        .bearer_auth(server.token("alice"))
        .send()
        .await
        .expect("eligibility")
        .json()
        .await
        .expect("eligibility json");
    assert_eq!(unmatched["matched"], false);

    let own = client
        .get(server.http_url("/api/v1/chat/eligibility/alice"))
        .bearer_auth(server.token("alice"))
        .send()
        .await
        .expect("eligibility");
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);

    let anonymous = client
        .get(server.http_url("/api/v1/chat/eligibility/bob"))
        .send()
        .await
        .expect("eligibility");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
