mod support;

use std::time::Duration;

use futures_util::SinkExt;
use serde_json::json;
use support::{assert_no_event, expect_event, next_event, send_event, wait_for_roster, TestServer};

#[tokio::test]
async fn message_delivered_to_online_recipient() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;
    wait_for_roster(&mut alice, &["alice", "bob"]).await;
    wait_for_roster(&mut bob, &["alice", "bob"]).await;

    send_event(
        &mut alice,
        "sendMessage",
        json!({"recipientUsername": "bob", "message": "hi", "conversationId": "c1"}),
    )
    .await;

    let received = expect_event(&mut bob, "newMessage").await;
    assert_eq!(received["senderUsername"], "alice");
    assert_eq!(received["recipientUsername"], "bob");
    assert_eq!(received["message"], "hi");
    assert_eq!(received["conversationId"], "c1");
    assert!(received["timestamp"].is_string());

    let ack = expect_event(&mut alice, "messageSent").await;
    assert_eq!(ack["delivered"], true);
    assert_eq!(ack["message"], "hi");
    assert_eq!(ack["timestamp"], received["timestamp"]);

    // 发送者不会收到自己的 newMessage
    assert_no_event(&mut alice, "newMessage", Duration::from_millis(200)).await;
}

#[tokio::test]
async fn message_to_offline_recipient_acknowledged_undelivered() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;
    wait_for_roster(&mut bob, &["alice", "bob"]).await;

    send_event(
        &mut alice,
        "sendMessage",
        json!({"recipientUsername": "carol", "message": "are you there?"}),
    )
    .await;

    let ack = expect_event(&mut alice, "messageSent").await;
    assert_eq!(ack["delivered"], false);
    assert_eq!(ack["recipientUsername"], "carol");

    assert_no_event(&mut bob, "newMessage", Duration::from_millis(200)).await;
}

#[tokio::test]
async fn messages_arrive_in_submission_order() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;
    wait_for_roster(&mut alice, &["alice", "bob"]).await;

    for body in ["one", "two", "three"] {
        send_event(
            &mut alice,
            "sendMessage",
            json!({"recipientUsername": "bob", "message": body}),
        )
        .await;
    }

    for body in ["one", "two", "three"] {
        let received = expect_event(&mut bob, "newMessage").await;
        assert_eq!(received["message"], body);
    }
}

#[tokio::test]
async fn typing_forwarded_but_never_to_self() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;
    wait_for_roster(&mut alice, &["alice", "bob"]).await;
    wait_for_roster(&mut bob, &["alice", "bob"]).await;

    send_event(
        &mut alice,
        "typing",
        json!({"recipientUsername": "bob", "isTyping": true}),
    )
    .await;
    let indicator = expect_event(&mut bob, "userTyping").await;
    assert_eq!(indicator, json!({"senderUsername": "alice", "isTyping": true}));

    send_event(
        &mut alice,
        "typing",
        json!({"recipientUsername": "alice", "isTyping": true}),
    )
    .await;
    send_event(
        &mut alice,
        "typing",
        json!({"recipientUsername": "carol", "isTyping": true}),
    )
    .await;
    assert_no_event(&mut alice, "userTyping", Duration::from_millis(200)).await;
}

#[tokio::test]
async fn malformed_frames_do_not_close_connection() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;
    wait_for_roster(&mut alice, &["alice", "bob"]).await;

    alice
        .send(tokio_tungstenite::tungstenite::Message::Text("garbage".into()))
        .await
        .expect("send");
    send_event(&mut alice, "sendMessage", json!({"message": "no recipient"})).await;
    send_event(&mut alice, "wave", json!({})).await;

    send_event(
        &mut alice,
        "sendMessage",
        json!({"recipientUsername": "bob", "message": "still here"}),
    )
    .await;
    let received = expect_event(&mut bob, "newMessage").await;
    assert_eq!(received["message"], "still here");
}

#[tokio::test]
async fn empty_message_reported_to_sender() {
    let server = TestServer::start().await;
    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;
    wait_for_roster(&mut alice, &["alice", "bob"]).await;

    send_event(
        &mut alice,
        "sendMessage",
        json!({"recipientUsername": "bob", "message": "   "}),
    )
    .await;

    let error = expect_event(&mut alice, "error").await;
    assert_eq!(error["code"], "INVALID_MESSAGE");
    let ack = next_event(&mut alice).await.expect("messageSent after error");
    assert_eq!(ack["event"], "messageSent");
    assert_eq!(ack["data"]["delivered"], false);
    assert_eq!(ack["data"]["message"], "   ");
    assert_no_event(&mut bob, "newMessage", Duration::from_millis(200)).await;
}

#[tokio::test]
async fn enforced_match_gate_blocks_unmatched_pairs() {
    let server = TestServer::start_with(|config| config.realtime.enforce_match_gate = true).await;
    server.match_gate.add_match("alice", "bob").await;

    let mut alice = server.connect("alice").await;
    let mut bob = server.connect("bob").await;
    let mut dave = server.connect("dave").await;
    wait_for_roster(&mut alice, &["alice", "bob", "dave"]).await;

    send_event(
        &mut dave,
        "sendMessage",
        json!({"recipientUsername": "alice", "message": "hey"}),
    )
    .await;
    let error = expect_event(&mut dave, "error").await;
    assert_eq!(error["code"], "NOT_MATCHED");
    let ack = expect_event(&mut dave, "messageSent").await;
    assert_eq!(ack["delivered"], false);

    send_event(
        &mut bob,
        "sendMessage",
        json!({"recipientUsername": "alice", "message": "hello match"}),
    )
    .await;
    let received = expect_event(&mut alice, "newMessage").await;
    assert_eq!(received["senderUsername"], "bob");
    assert_eq!(received["message"], "hello match");
}
