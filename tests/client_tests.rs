//! Integration-style client tests for the GameLink client.
//!
//! Uses the shared `MockConnector`/`MockServer` from `tests/common` to drive
//! a real `GameLinkClient` (connection task, router, scheduler, session) and
//! verify delivery order, thread affinity, failure isolation and the
//! authentication handshake end to end.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gamelink_client::event::{AuthEvent, ConnectionEvent};
use gamelink_client::protocol::{
    ChatMessage, EnemyDamage, EnemyDeath, EquipmentSlot, MessageType, PlayerMovement, Vec3,
};
use gamelink_client::{
    AuthState, ConnectionState, GameLinkClient, GameLinkError, ReconnectPolicy,
};
use tracing_subscriber::layer::SubscriberExt;

use common::{
    chat_json, connection_confirmed_json, login_accepted_json, login_rejected_json, mock_client,
    settle, test_config, MockConnector, WarnCounter,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn record<E: Clone + 'static>(client: &mut GameLinkClient) -> Rc<RefCell<Vec<E>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    client.subscribe(move |event: &E| {
        sink.borrow_mut().push(event.clone());
        Ok(())
    });
    seen
}

/// Connect and deliver the `Connected` event.
async fn connect_and_open(client: &mut GameLinkClient) {
    assert!(client.connect());
    settle().await;
    assert!(client.is_connected(), "mock connection should be open");
    client.tick();
}

// ════════════════════════════════════════════════════════════════════
// Inbound delivery
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn chat_message_fires_once_after_one_tick() {
    let (mut client, server, _) = mock_client(test_config());
    let chats = record::<ChatMessage>(&mut client);
    connect_and_open(&mut client).await;

    server.push(r#"{"Type":"ChatMessage","Data":{"SenderId":"p1","Message":"hi","ChannelType":"Global"}}"#);
    settle().await;
    assert!(chats.borrow().is_empty(), "nothing is delivered before the tick");

    client.tick();
    client.tick();

    let chats = chats.borrow();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].sender_id, "p1");
    assert_eq!(chats[0].message, "hi");
}

#[tokio::test]
async fn damage_is_observed_before_death() {
    let (mut client, server, _) = mock_client(test_config());
    let order = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&order);
    client.subscribe(move |d: &EnemyDamage| {
        log.borrow_mut().push(format!("damage:{}:{}", d.enemy_id, d.damage));
        Ok(())
    });
    let log = Rc::clone(&order);
    client.subscribe(move |d: &EnemyDeath| {
        log.borrow_mut().push(format!("death:{}", d.enemy_id));
        Ok(())
    });
    connect_and_open(&mut client).await;

    server.push(r#"{"Type":"EnemyDamage","Data":{"EnemyId":"e1","Damage":5}}"#);
    server.push(r#"{"Type":"EnemyDeath","Data":{"EnemyId":"e1"}}"#);
    settle().await;
    client.tick();

    assert_eq!(*order.borrow(), vec!["damage:e1:5", "death:e1"]);
}

#[tokio::test]
async fn long_bursts_keep_wire_order() {
    let (mut client, server, _) = mock_client(test_config());
    let chats = record::<ChatMessage>(&mut client);
    connect_and_open(&mut client).await;

    for n in 0..200 {
        server.push(chat_json("p1", &n.to_string()));
    }
    settle().await;
    let report = client.tick();

    assert_eq!(report.executed, 200);
    let received: Vec<String> = chats.borrow().iter().map(|c| c.message.clone()).collect();
    let expected: Vec<String> = (0..200).map(|n| n.to_string()).collect();
    assert_eq!(received, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribers_only_run_on_the_ticking_thread() {
    let (mut client, server, _) = mock_client(test_config());
    let consumer = std::thread::current().id();
    let threads = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&threads);
    client.subscribe(move |_: &ChatMessage| {
        sink.borrow_mut().push(std::thread::current().id());
        Ok(())
    });
    let sink = Rc::clone(&threads);
    client.subscribe(move |_: &ConnectionEvent| {
        sink.borrow_mut().push(std::thread::current().id());
        Ok(())
    });

    client.connect();
    for n in 0..20 {
        server.push(chat_json("p2", &n.to_string()));
    }
    settle().await;
    assert!(threads.borrow().is_empty(), "no callback may run outside a tick");

    client.tick();
    let threads = threads.borrow();
    assert_eq!(threads.len(), 21);
    assert!(threads.iter().all(|id| *id == consumer));
}

#[tokio::test]
async fn failing_subscriber_does_not_block_later_messages() {
    let (mut client, server, _) = mock_client(test_config());
    client.subscribe(|_: &EnemyDamage| Err("world state out of sync".into()));
    client.subscribe(|_: &EnemyDeath| -> gamelink_client::event_bus::HandlerResult {
        panic!("death handler exploded")
    });
    let chats = record::<ChatMessage>(&mut client);
    connect_and_open(&mut client).await;

    server.push(r#"{"Type":"EnemyDamage","Data":{"EnemyId":"e1","Damage":5}}"#);
    server.push(r#"{"Type":"EnemyDeath","Data":{"EnemyId":"e1"}}"#);
    server.push(chat_json("p1", "still here"));
    settle().await;
    let report = client.tick();

    assert_eq!(report.executed, 3);
    assert_eq!(report.failed, 2);
    assert_eq!(chats.borrow().len(), 1);
}

#[tokio::test]
async fn unknown_tag_logs_one_warning_and_publishes_nothing() {
    let warnings = WarnCounter::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(warnings.clone()));

    let (mut client, server, _) = mock_client(test_config());
    let chats = record::<ChatMessage>(&mut client);
    connect_and_open(&mut client).await;
    assert_eq!(warnings.count(), 0);

    server.push(r#"{"Type":"Teleport","Data":{"X":1}}"#);
    settle().await;

    assert_eq!(warnings.count(), 1);
    assert_eq!(client.pending_actions(), 0);
    assert_eq!(client.tick().executed, 0);
    assert!(chats.borrow().is_empty());
    assert!(client.is_connected());
}

#[tokio::test]
async fn malformed_frame_is_dropped_and_next_message_arrives() {
    let (mut client, server, _) = mock_client(test_config());
    let chats = record::<ChatMessage>(&mut client);
    connect_and_open(&mut client).await;

    server.push("{{not valid json at all!!!");
    server.push(r#"{"Type":"ChatMessage","Data":{"Message":"no sender"}}"#);
    server.push(chat_json("p3", "after the garbage"));
    settle().await;
    client.tick();

    let chats = chats.borrow();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].sender_id, "p3");
}

// ════════════════════════════════════════════════════════════════════
// Outbound
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn outbound_while_disconnected_writes_nothing() {
    let (client, server, attempts) = mock_client(test_config());
    let out = client.outbound().clone();

    let receipts = vec![
        out.heartbeat(),
        out.login("alice", "pw"),
        out.validate_session("tok"),
        out.send_movement(&PlayerMovement {
            player_id: "p1".into(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            velocity: Vec3::ZERO,
            is_grounded: true,
            timestamp: 0.0,
        }),
        out.request_respawn("p1"),
        out.request_inventory("p1"),
        out.use_item("potion", None),
        out.sell_item("sword", 1),
        out.equip_item("sword", EquipmentSlot::MainHand),
        out.unequip_item(EquipmentSlot::MainHand),
        out.request_equipment("p1"),
        out.pickup_loot("loot-1"),
        out.throw_grenade("frag", Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), 10.0),
        out.continue_level("p1", 2),
        out.allocate_skill("Strength", 1),
    ];

    for receipt in receipts {
        assert!(!receipt.was_queued());
        assert!(matches!(receipt.await, Err(GameLinkError::NotConnected)));
    }
    settle().await;
    assert!(server.sent().is_empty());
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn receipt_resolves_after_the_write() {
    let (mut client, server, _) = mock_client(test_config());
    connect_and_open(&mut client).await;

    let result = client.outbound().pickup_loot("loot-7").await;
    assert!(result.is_ok());

    let pickups = server.sent_of_type("LootPickupRequest");
    assert_eq!(pickups.len(), 1);
    assert_eq!(pickups[0]["Data"]["LootId"], "loot-7");
}

#[tokio::test]
async fn outbound_handle_works_from_another_thread() {
    let (mut client, server, _) = mock_client(test_config());
    connect_and_open(&mut client).await;

    let out = client.outbound().clone();
    let result = tokio::task::spawn_blocking(move || {
        out.request_respawn("p9").detach();
    })
    .await;
    assert!(result.is_ok());
    settle().await;

    assert_eq!(server.sent_of_type("RespawnRequest").len(), 1);
}

#[tokio::test]
async fn heartbeat_sent_exactly_once_after_interval() {
    let (mut client, server, _) = mock_client(test_config().with_heartbeat_interval(Duration::from_secs(5)));
    client.connect();
    settle().await;

    let t0 = Instant::now();
    client.tick_at(t0);
    client.tick_at(t0 + Duration::from_secs(2));
    client.tick_at(t0 + Duration::from_secs(5));
    client.tick_at(t0 + Duration::from_millis(5_016));
    client.tick_at(t0 + Duration::from_millis(5_032));
    settle().await;

    assert_eq!(server.sent(), vec![r#"{"Type":"Heartbeat","Data":{}}"#.to_owned()]);
}

#[tokio::test]
async fn heartbeat_stops_after_disconnect() {
    let (mut client, server, _) = mock_client(test_config());
    client.connect();
    settle().await;
    let t0 = Instant::now();
    client.tick_at(t0);

    server.hang_up();
    settle().await;
    client.tick_at(t0 + Duration::from_secs(1));
    client.tick_at(t0 + Duration::from_secs(30));
    settle().await;

    assert!(server.sent_of_type("Heartbeat").is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Authentication handshake
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn confirmation_without_credentials_requests_login() {
    let (mut client, server, _) = mock_client(test_config());
    let auth = record::<AuthEvent>(&mut client);
    connect_and_open(&mut client).await;

    server.push(connection_confirmed_json("c-1"));
    settle().await;
    client.tick();
    settle().await;

    assert_eq!(client.auth_state(), AuthState::AwaitingCredentials);
    assert_eq!(*auth.borrow(), vec![AuthEvent::LoginRequired]);
    assert!(server.sent_of_type("Login").is_empty());
    assert!(server.sent_of_type("SessionValidation").is_empty());
}

#[tokio::test]
async fn login_after_prompt_completes_handshake() {
    let (mut client, server, _) = mock_client(test_config());
    let auth = record::<AuthEvent>(&mut client);
    connect_and_open(&mut client).await;
    server.push(connection_confirmed_json("c-1"));
    settle().await;
    client.tick();

    client.login("alice", "hunter2");
    settle().await;
    let logins = server.sent_of_type("Login");
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0]["Data"]["Username"], "alice");
    assert_eq!(client.auth_state(), AuthState::Authenticating);

    server.push(login_accepted_json("p1", Some("tok-1")));
    settle().await;
    client.tick();

    assert_eq!(client.auth_state(), AuthState::Authenticated);
    let session = client.session().unwrap();
    assert_eq!(session.connection_id, "c-1");
    assert_eq!(session.player_id, "p1");
    assert_eq!(session.session_token.as_deref(), Some("tok-1"));
    assert!(matches!(auth.borrow().last(), Some(AuthEvent::Authenticated(s)) if s.player_id == "p1"));
}

#[tokio::test]
async fn cached_token_resumes_session() {
    let (mut client, server, _) = mock_client(test_config());
    client.set_cached_token(Some("persisted".into()));
    connect_and_open(&mut client).await;

    server.push(connection_confirmed_json("c-2"));
    settle().await;
    client.tick();
    settle().await;

    let validations = server.sent_of_type("SessionValidation");
    assert_eq!(validations.len(), 1);
    assert_eq!(validations[0]["Data"]["SessionToken"], "persisted");
    assert!(server.sent_of_type("Login").is_empty());

    server.push(login_accepted_json("p5", None));
    settle().await;
    client.tick();
    assert_eq!(client.session().unwrap().session_token.as_deref(), Some("persisted"));
}

#[tokio::test]
async fn rejected_login_publishes_reason() {
    let (mut client, server, _) = mock_client(test_config());
    let auth = record::<AuthEvent>(&mut client);
    client.login("alice", "wrong");
    connect_and_open(&mut client).await;

    server.push(connection_confirmed_json("c-3"));
    settle().await;
    client.tick();
    server.push(login_rejected_json("invalid password"));
    settle().await;
    client.tick();

    assert_eq!(client.auth_state(), AuthState::Anonymous);
    assert!(client.session().is_none());
    assert_eq!(
        *auth.borrow(),
        vec![AuthEvent::AuthFailed {
            reason: "invalid password".into()
        }]
    );
}

// ════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn refused_connection_surfaces_as_event() {
    let connector = MockConnector::default();
    connector.refuse(GameLinkError::Connection("no route to host".into()));
    let mut client = GameLinkClient::with_connector(test_config(), connector);
    let events = record::<ConnectionEvent>(&mut client);

    assert!(client.connect());
    settle().await;
    client.tick();

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.auth_state(), AuthState::Anonymous);
    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        ConnectionEvent::Disconnected { reason: Some(r) } if r.contains("no route to host")
    ));
}

#[tokio::test]
async fn server_hang_up_resets_session() {
    let (mut client, server, _) = mock_client(test_config());
    let events = record::<ConnectionEvent>(&mut client);
    client.login("alice", "pw");
    connect_and_open(&mut client).await;
    server.push(connection_confirmed_json("c-1"));
    server.push(login_accepted_json("p1", Some("tok")));
    settle().await;
    client.tick();
    assert_eq!(client.auth_state(), AuthState::Authenticated);

    server.hang_up();
    settle().await;
    client.tick();

    assert!(!client.is_connected());
    assert_eq!(client.auth_state(), AuthState::Anonymous);
    assert!(client.session().is_none());
    assert_eq!(
        events.borrow().last(),
        Some(&ConnectionEvent::Disconnected { reason: None })
    );

    // Sends after the hang-up never reach the transport.
    let before = server.sent().len();
    client.outbound().heartbeat().detach();
    settle().await;
    assert_eq!(server.sent().len(), before);
}

#[tokio::test]
async fn disconnect_sends_reason_and_reports_once() {
    let (mut client, server, _) = mock_client(test_config());
    let events = record::<ConnectionEvent>(&mut client);
    connect_and_open(&mut client).await;

    client.disconnect("returning to menu").await;
    client.disconnect("again").await;
    client.tick();

    assert_eq!(server.closed_with(), Some(Some("returning to menu".into())));
    assert_eq!(
        *events.borrow(),
        vec![
            ConnectionEvent::Connected {
                url: "ws://mock.local/game".into()
            },
            ConnectionEvent::Disconnected {
                reason: Some("returning to menu".into())
            },
        ]
    );
}

#[tokio::test]
async fn bounded_reconnect_resumes_with_cached_token() {
    let connector = MockConnector::default();
    let first = connector.accept();
    let second = connector.accept();
    let attempts = Arc::clone(&connector.attempts);
    let mut client = GameLinkClient::with_connector(
        test_config()
            .with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 3 })
            .with_reconnect_delay(Duration::from_secs(2)),
        connector,
    );
    client.login("alice", "pw");

    client.connect();
    settle().await;
    first.push(connection_confirmed_json("c-1"));
    first.push(login_accepted_json("p1", Some("tok-1")));
    settle().await;
    let t0 = Instant::now();
    client.tick_at(t0);
    assert_eq!(client.auth_state(), AuthState::Authenticated);

    first.hang_up();
    settle().await;
    client.tick_at(t0 + Duration::from_secs(1));
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);

    client.tick_at(t0 + Duration::from_secs(3));
    settle().await;
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert!(client.is_connected());

    second.push(connection_confirmed_json("c-2"));
    settle().await;
    client.tick_at(t0 + Duration::from_secs(4));
    settle().await;

    let validations = second.sent_of_type(MessageType::SessionValidation.as_str());
    assert_eq!(validations.len(), 1);
    assert_eq!(validations[0]["Data"]["SessionToken"], "tok-1");
}

#[tokio::test]
async fn default_policy_stays_disconnected() {
    let (mut client, server, attempts) = mock_client(test_config());
    client.connect();
    settle().await;
    server.hang_up();
    settle().await;

    let t0 = Instant::now();
    client.tick_at(t0);
    client.tick_at(t0 + Duration::from_secs(120));
    settle().await;

    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(client.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn reconnect_before_tick_keeps_the_new_attempt() {
    let connector = MockConnector::default();
    let first = connector.accept();
    let second = connector.accept();
    let attempts = Arc::clone(&connector.attempts);
    let mut client = GameLinkClient::with_connector(
        test_config()
            .with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 3 })
            .with_reconnect_delay(Duration::from_secs(1)),
        connector,
    );
    let events = record::<ConnectionEvent>(&mut client);
    client.login("alice", "pw");
    connect_and_open(&mut client).await;

    // The old connection's Disconnected is still queued when the caller
    // retries.
    first.hang_up();
    settle().await;
    assert!(!client.is_connected());
    assert!(client.connect());
    assert_eq!(client.auth_state(), AuthState::Connecting);
    settle().await;

    let t0 = Instant::now();
    client.tick_at(t0);
    assert!(client.is_connected());
    assert_eq!(client.auth_state(), AuthState::Connecting);
    assert_eq!(events.borrow().len(), 3);
    assert!(matches!(events.borrow()[1], ConnectionEvent::Disconnected { .. }));

    // No retry was armed by the superseded connection.
    client.tick_at(t0 + Duration::from_secs(10));
    settle().await;
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);

    second.push(connection_confirmed_json("c-2"));
    settle().await;
    client.tick_at(t0 + Duration::from_secs(11));
    settle().await;
    assert_eq!(client.auth_state(), AuthState::Authenticating);
    assert_eq!(second.sent_of_type("Login").len(), 1);
}

#[tokio::test]
async fn unbounded_heartbeat_interval_still_reports_connected() {
    let (mut client, _server, _) =
        mock_client(test_config().with_heartbeat_interval(Duration::MAX));
    let events = record::<ConnectionEvent>(&mut client);

    assert!(client.connect());
    settle().await;
    let report = client.tick();
    assert_eq!(report.failed, 0);
    assert!(matches!(events.borrow()[..], [ConnectionEvent::Connected { .. }]));
}

#[tokio::test]
async fn unbounded_reconnect_delay_still_reports_disconnected() {
    let (mut client, server, attempts) = mock_client(
        test_config()
            .with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 1 })
            .with_reconnect_delay(Duration::MAX),
    );
    let events = record::<ConnectionEvent>(&mut client);
    connect_and_open(&mut client).await;

    server.hang_up();
    settle().await;
    let report = client.tick();
    assert_eq!(report.failed, 0);
    assert_eq!(events.borrow().len(), 2);
    assert!(matches!(events.borrow()[1], ConnectionEvent::Disconnected { .. }));
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn receive_error_reconnects_to_the_same_url() {
    let connector = MockConnector::default();
    let server = connector.accept();
    let urls = Arc::clone(&connector.urls);
    let mut client = GameLinkClient::with_connector(
        test_config()
            .with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 1 })
            .with_reconnect_delay(Duration::from_secs(1)),
        connector,
    );
    let events = record::<ConnectionEvent>(&mut client);

    assert!(client.connect_to("ws://backup.local/game"));
    settle().await;
    assert!(client.is_connected());

    server.fail(GameLinkError::TransportReceive("reset by peer".into()));
    settle().await;
    assert_eq!(client.connection_state(), ConnectionState::Closed);

    let t0 = Instant::now();
    client.tick_at(t0);
    match &events.borrow()[..] {
        [ConnectionEvent::Connected { .. }, ConnectionEvent::Disconnected { reason: Some(reason) }] => {
            assert!(reason.contains("reset by peer"), "reason: {reason}");
        }
        other => panic!("unexpected events: {other:?}"),
    }

    client.tick_at(t0 + Duration::from_secs(2));
    settle().await;
    assert_eq!(
        *urls.lock().unwrap(),
        vec!["ws://backup.local/game".to_owned(), "ws://backup.local/game".to_owned()]
    );
}
