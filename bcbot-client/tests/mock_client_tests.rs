// ABOUTME: Tests for MockClient scripting through the SessionHandle path.
// ABOUTME: Exercises rooms, lookups, history, delays, rejections and injected events.

use bcbot_client::{
    BotConfig, ChatClient, ClientError, EventKind, HistoryQuery, InboundEvent, Member,
    MockClient, RoomParams, RoomSummary, SessionHandle,
};
use serde_json::json;
use std::time::Duration;

fn bot_config(chatroom: serde_json::Value) -> BotConfig {
    BotConfig {
        username: "bot".to_string(),
        password: "pw".to_string(),
        appearance_code: String::new(),
        server_url: "https://example.invalid/".to_string(),
        origin: "https://example.invalid".to_string(),
        chatroom,
    }
}

#[tokio::test]
async fn test_create_join_leave_through_handle() {
    let mock = MockClient::new()
        .with_player(10, "Bot")
        .with_room(RoomSummary::new("Garden").with_member(Member::new(20, "Alice")));
    let connection = mock.connect(&bot_config(json!({}))).await.unwrap();
    let handle = SessionHandle::spawn(connection.session, "mock");

    let created = handle.create_room(&RoomParams::new("Den")).await.unwrap();
    assert_eq!(created.members, vec![Member::new(10, "Bot")]);
    assert_eq!(mock.current_room().as_deref(), Some("Den"));

    let err = handle.create_room(&RoomParams::new("Den")).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));

    let joined = handle.join_room("Garden").await.unwrap();
    assert_eq!(joined.members.len(), 2);
    // Leaving Den on the way out
    assert!(mock.room("Den").unwrap().members.is_empty());

    handle.leave_room().await.unwrap();
    assert!(mock.current_room().is_none());
    let err = handle.leave_room().await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));
}

#[tokio::test]
async fn test_member_lookups() {
    let mock = MockClient::new()
        .with_player(10, "Bot")
        .with_room(RoomSummary::new("Garden").with_member(Member::new(20, "Alice")))
        .with_account(99, json!({ "MemberNumber": 99, "Name": "Remote" }));
    let connection = mock
        .connect(&bot_config(json!({ "Name": "Garden" })))
        .await
        .unwrap();
    let handle = SessionHandle::spawn(connection.session, "mock");

    assert_eq!(handle.query_account(99).await.unwrap()["Name"], "Remote");
    assert_eq!(handle.get_character_data(20).await.unwrap()["Name"], "Alice");

    let detail = handle.get_room_member_detail(10).await.unwrap();
    assert_eq!(detail["IsPlayer"], true);
    assert_eq!(detail["Room"], "Garden");

    assert!(handle.get_character_data(99).await.is_err());
}

#[tokio::test]
async fn test_history_returns_most_recent_entries() {
    let mock = MockClient::new().without_echo();
    let connection = mock
        .connect(&bot_config(json!({ "Name": "Den" })))
        .await
        .unwrap();
    let handle = SessionHandle::spawn(connection.session, "mock");

    for text in ["one", "two", "three"] {
        handle.send_message(text).await.unwrap();
    }
    let history = handle
        .get_chat_history(&HistoryQuery { limit: Some(2) })
        .await
        .unwrap();
    let contents: Vec<_> = history.iter().map(|h| h["Content"].clone()).collect();
    assert_eq!(contents, vec![json!("two"), json!("three")]);
}

#[tokio::test]
async fn test_rejection_and_delay_scripting() {
    let mock = MockClient::new()
        .reject("search_rooms", ClientError::Rejected("rate limited".to_string()))
        .delay("query_account", Duration::from_millis(20));
    let connection = mock.connect(&bot_config(json!({}))).await.unwrap();
    let handle = SessionHandle::spawn(connection.session, "mock");

    let err = handle.search_rooms(&Default::default()).await.unwrap_err();
    assert_eq!(err, ClientError::Rejected("rate limited".to_string()));

    mock.set_rejection("search_rooms", None);
    assert!(handle.search_rooms(&Default::default()).await.is_ok());

    let slow = tokio::time::timeout(Duration::from_millis(5), handle.query_account(1)).await;
    assert!(slow.is_err());

    assert_eq!(mock.call_count("search_rooms"), 2);
}

#[tokio::test]
async fn test_injected_events_arrive_in_order() {
    let mock = MockClient::new();
    let mut connection = mock.connect(&bot_config(json!({}))).await.unwrap();

    assert!(mock.inject_event(InboundEvent::new(EventKind::Presence, json!({ "n": 1 }))));
    assert!(mock.inject_event(InboundEvent::new(EventKind::Other, json!({ "n": 2 }))));

    let first = connection.events.recv().await.unwrap();
    let second = connection.events.recv().await.unwrap();
    assert_eq!(first.payload["n"], 1);
    assert_eq!(second.kind, EventKind::Other);
}

#[tokio::test]
async fn test_disconnect_closes_event_stream() {
    let mock = MockClient::new();
    let mut connection = mock.connect(&bot_config(json!({}))).await.unwrap();
    let handle = SessionHandle::spawn(connection.session, "mock");

    handle.close().await.unwrap();
    assert!(connection.events.recv().await.is_none());
    assert!(!mock.is_connected());
    assert!(!mock.inject_event(InboundEvent::new(EventKind::Other, json!({}))));
}

#[tokio::test]
async fn test_reconnect_invalidates_previous_session() {
    let mock = MockClient::new();
    let old = mock.connect(&bot_config(json!({}))).await.unwrap();
    let _new = mock.connect(&bot_config(json!({}))).await.unwrap();

    let err = old.session.leave_room().await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectionLost(_)));
    assert_eq!(mock.connect_count(), 2);
}
