//! Message channel and directory behaviour through the running client
//!
//! Run with: cargo test -p babelcast-webrtc --test signaling_test

mod harness;

use babelcast_webrtc::{
    ChannelMessage, ClientConfig, ClientExit, ConnectionState, Intent, MessageKind, UiEvent,
};
use harness::{host_candidate, init_logging, Rig};
use serde_json::json;
use std::time::Duration;

fn subscriber_config() -> ClientConfig {
    ClientConfig::trickle("ws://localhost:8080/ws")
}

// ============================================================================
// Readiness gate
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_messages_sent_before_open_flush_in_order_once() {
    init_logging();
    let rig = Rig::publisher(ClientConfig::trickle("ws://localhost:8080/ws"));

    rig.intent(Intent::Connect).await;
    rig.intent(Intent::SubmitCredentials {
        channel: "radio".to_string(),
        password: "secret".to_string(),
    })
    .await;
    rig.discover(host_candidate(1)).await;

    assert!(rig.sink.frames().is_empty(), "nothing may reach the socket before it opens");

    rig.open().await;
    assert_eq!(
        rig.sink.kinds(),
        vec![
            MessageKind::SessionPublisher,
            MessageKind::ConnectPublisher,
            MessageKind::IceCandidate,
        ]
    );

    // A second open must not replay the queue
    rig.open().await;
    assert_eq!(rig.sink.frames().len(), 3);

    let exit = tokio_test::assert_ok!(rig.close(None).await);
    assert_eq!(exit, ClientExit::ChannelClosed(None));
}

#[tokio::test(start_paused = true)]
async fn test_messages_after_open_go_straight_out() {
    init_logging();
    let rig = Rig::subscriber(subscriber_config());

    rig.open().await;
    rig.intent(Intent::Connect).await;

    assert_eq!(rig.sink.kinds(), vec![MessageKind::GetChannels]);
    tokio_test::assert_ok!(rig.reload().await);
}

// ============================================================================
// Channel directory
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_directory_polls_until_first_listing() {
    init_logging();
    let rig = Rig::subscriber(subscriber_config());

    rig.intent(Intent::Connect).await;
    rig.open().await;
    assert_eq!(rig.sink.count(MessageKind::GetChannels), 1);

    for _ in 0..3 {
        rig.receive("channels", json!([])).await;
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
    assert_eq!(rig.sink.count(MessageKind::GetChannels), 4);
    assert!(rig.ui.contains(&UiEvent::ChannelsEmpty));

    rig.receive("channels", json!(["radio"])).await;
    assert!(rig.ui.contains(&UiEvent::Channels(vec!["radio".to_string()])));
    assert_eq!(rig.ui.state(), Some(ConnectionState::AwaitingChannelPick));
    assert_eq!(rig.ui.channel_pick_visible(), Some(true));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(rig.sink.count(MessageKind::GetChannels), 4);

    tokio_test::assert_ok!(rig.reload().await);
}

#[tokio::test(start_paused = true)]
async fn test_directory_does_not_pile_up_before_open() {
    init_logging();
    let rig = Rig::subscriber(subscriber_config());

    rig.intent(Intent::Connect).await;
    tokio::time::sleep(Duration::from_millis(3500)).await;
    rig.open().await;

    assert_eq!(rig.sink.count(MessageKind::GetChannels), 1);
    tokio_test::assert_ok!(rig.reload().await);
}

#[tokio::test(start_paused = true)]
async fn test_directory_listing_is_deduplicated() {
    init_logging();
    let rig = Rig::subscriber(subscriber_config());

    rig.intent(Intent::Connect).await;
    rig.open().await;
    rig.receive("channels", json!(["radio", "", "radio", "jazz"])).await;

    assert!(rig.ui.contains(&UiEvent::Channels(vec![
        "radio".to_string(),
        "jazz".to_string()
    ])));
    tokio_test::assert_ok!(rig.reload().await);
}

// ============================================================================
// Inbound dispatch
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_unknown_kinds_are_ignored() {
    init_logging();
    let rig = Rig::subscriber(subscriber_config());

    rig.intent(Intent::Connect).await;
    rig.open().await;
    rig.receive("stats", json!({"listeners": 3})).await;
    rig.receive("info", json!("welcome")).await;

    assert!(rig.ui.contains(&UiEvent::Info("welcome".to_string())));
    assert_eq!(rig.ui.state(), Some(ConnectionState::AwaitingDirectory));
    assert!(rig.ui.errors().is_empty());
    tokio_test::assert_ok!(rig.reload().await);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_listing_is_reported_and_polling_continues() {
    init_logging();
    let rig = Rig::subscriber(subscriber_config());

    rig.intent(Intent::Connect).await;
    rig.open().await;
    rig.receive("channels", json!({"not": "a list"})).await;

    let errors = rig.ui.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("channels"));
    assert_eq!(rig.ui.state(), Some(ConnectionState::AwaitingDirectory));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(rig.sink.count(MessageKind::GetChannels), 2);
    tokio_test::assert_ok!(rig.reload().await);
}

#[tokio::test(start_paused = true)]
async fn test_chat_messages_reach_the_ui() {
    init_logging();
    let rig = Rig::subscriber(subscriber_config());

    rig.intent(Intent::Connect).await;
    rig.open().await;
    rig.receive("msg", json!({"sender": "host", "message": "hello"})).await;

    assert!(rig.ui.contains(&UiEvent::Chat {
        sender: "host".to_string(),
        message: "hello".to_string()
    }));
    tokio_test::assert_ok!(rig.reload().await);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_socket_close_tears_down_the_session() {
    init_logging();
    let rig = Rig::subscriber(subscriber_config());
    let engine = rig.engine.clone();
    let ui = rig.ui.clone();
    let sink = rig.sink.clone();

    rig.intent(Intent::Connect).await;
    rig.open().await;

    let exit = tokio_test::assert_ok!(rig.close(Some("server going away")).await);
    assert_eq!(exit, ClientExit::ChannelClosed(Some("server going away".to_string())));
    assert_eq!(engine.close_count(), 1);
    assert_eq!(ui.state(), Some(ConnectionState::Closed));
    assert!(ui.contains(&UiEvent::SpinnerVisible(false)));

    // The closed channel must not have written anything new
    assert!(sink
        .messages()
        .iter()
        .all(|m| matches!(m, ChannelMessage::GetChannels)));
}

#[tokio::test(start_paused = true)]
async fn test_reload_releases_publisher_media() {
    init_logging();
    let rig = Rig::publisher(ClientConfig::trickle("ws://localhost:8080/ws"));
    let engine = rig.engine.clone();
    let capture = rig.capture.clone();

    rig.intent(Intent::Connect).await;
    rig.open().await;

    let exit = tokio_test::assert_ok!(rig.reload().await);
    assert_eq!(exit, ClientExit::Reload);
    assert_eq!(engine.close_count(), 1);
    assert!(capture.stopped.load(std::sync::atomic::Ordering::SeqCst));
}
