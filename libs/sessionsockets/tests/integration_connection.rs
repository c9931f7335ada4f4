//! Integration tests for the connection manager state machine
//!
//! The manager is driven by hand through a recording connector and a manual
//! scheduler, so every transition is deterministic.

mod common;

use common::{Harness, SESSION};
use parking_lot::Mutex;
use serde_json::json;
use sessionsockets::core::*;
use sessionsockets::traits::{ExponentialBackoff, FixedDelay, SessionError};
use std::sync::Arc;
use std::time::Duration;

fn user_message(text: &str) -> ClientMessage {
    ClientMessage::UserMessage(UserMessage {
        session_id: SessionId::new(SESSION),
        message: text.to_string(),
        context: None,
    })
}

#[test]
fn test_connect_handshake_ready_then_send_transmits() {
    verbose_println!("Testing connect -> handshake -> ready...");

    let mut h = Harness::new();
    h.manager.connect("S1");
    assert_eq!(h.state(), ConnectionState::Connecting);
    assert!(!h.manager.is_ready());

    let t1 = h.open_latest();
    assert_eq!(h.state(), ConnectionState::Handshaking);
    assert_eq!(h.wire.lock().sent_types(t1), vec!["handshake"]);

    let sent = h.wire.lock().sent_on(t1);
    assert_eq!(sent[0]["session_id"], "S1");
    assert_eq!(sent[0]["client_type"], DEFAULT_CLIENT_KIND);

    h.ack(t1, "S1", "C1");
    assert_eq!(h.state(), ConnectionState::Ready);
    assert!(h.manager.is_ready());
    assert_eq!(h.manager.connection_id(), Some("C1"));

    let outcome = h.manager.send_user_message("hello", None).unwrap();
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(h.wire.lock().sent_types(t1), vec!["handshake", "user_message"]);
    assert_eq!(h.wire.lock().sent_on(t1)[1]["message"], "hello");

    let events = h.drain_events();
    let states: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Handshaking,
            ConnectionState::Ready,
        ]
    );
    assert!(events.contains(&ClientEvent::Ready {
        connection_id: "C1".to_string(),
        is_reconnect: false,
    }));
}

#[test]
fn test_sends_before_ready_are_flushed_in_order_after_handshake() {
    verbose_println!("Testing queued sends flush FIFO...");

    let mut h = Harness::new();
    h.manager.connect(SESSION);

    for text in ["queued-1", "queued-2", "queued-3"] {
        assert_eq!(h.manager.send(user_message(text)).unwrap(), SendOutcome::Queued);
    }
    assert_eq!(h.manager.queued_len(), 3);

    let t1 = h.open_latest();
    // Only the handshake goes out before the ack
    assert_eq!(h.wire.lock().sent_types(t1), vec!["handshake"]);
    assert_eq!(h.manager.send(user_message("queued-4")).unwrap(), SendOutcome::Queued);

    h.ack(t1, SESSION, "conn-1");

    let sent = h.wire.lock().sent_on(t1);
    let bodies: Vec<_> = sent.iter().skip(1).map(|f| f["message"].as_str().unwrap()).collect();
    assert_eq!(sent[0]["type"], "handshake");
    assert_eq!(bodies, vec!["queued-1", "queued-2", "queued-3", "queued-4"]);
    assert_eq!(h.manager.queued_len(), 0);
}

#[test]
fn test_handshake_precedes_every_frame_on_each_transport() {
    let mut h = Harness::with_config(
        ManagerConfig::default().reconnect_strategy(FixedDelay::new(Duration::from_millis(10), None)),
    );
    h.manager.connect(SESSION);
    h.manager.send(user_message("a")).unwrap();

    for round in 0..3 {
        let id = h.open_latest();
        h.ack(id, SESSION, &format!("conn-{}", round));
        h.manager.send(user_message("b")).unwrap();
        h.close_latest("network blip");
        h.manager.send(user_message("c")).unwrap();
        h.fire_pending();
    }

    let wire = h.wire.lock();
    for id in wire.opened.clone() {
        let types = wire.sent_types(id);
        if let Some(first) = types.first() {
            assert_eq!(first, "handshake", "{} started with {}", id, first);
            assert_eq!(types.iter().filter(|t| *t == "handshake").count(), 1);
        }
    }
}

#[test]
fn test_connect_twice_same_session_yields_one_transport() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    h.manager.connect(SESSION);
    assert_eq!(h.wire.lock().opened.len(), 1);

    let t1 = h.open_latest();
    h.manager.connect(SESSION);
    h.ack(t1, SESSION, "conn-1");
    h.manager.connect(SESSION);

    assert_eq!(h.wire.lock().opened.len(), 1);
    assert!(h.wire.lock().closed.is_empty());
    assert_eq!(h.state(), ConnectionState::Ready);
}

#[test]
fn test_connect_to_other_session_replaces_transport_and_discards_queue() {
    let mut h = Harness::new();
    h.manager.connect("S1");
    h.manager.send_user_message("for S1", None).unwrap();
    let t1 = h.latest();

    h.manager.connect("S2");

    let wire = h.wire.lock();
    assert_eq!(wire.closed, vec![t1]);
    assert_eq!(wire.opened.len(), 2);
    drop(wire);

    assert_eq!(h.manager.queued_len(), 0);
    assert_eq!(h.manager.session_id().map(SessionId::as_str), Some("S2"));

    let t2 = h.open_latest();
    assert_eq!(h.wire.lock().sent_on(t2)[0]["session_id"], "S2");
}

#[test]
fn test_backoff_doubles_and_counter_resets_only_on_ack() {
    verbose_println!("Testing backoff curve and counter reset...");

    let mut h = Harness::new();
    h.ready(SESSION);

    h.close_latest("connection reset");
    assert_eq!(h.state(), ConnectionState::Reconnecting);
    assert_eq!(h.manager.reconnect_attempts(), 1);
    assert_eq!(h.fire_pending(), Duration::from_millis(1000));
    assert_eq!(h.state(), ConnectionState::Connecting);

    // Attempt 1 fails before opening
    h.close_latest("connection refused");
    assert_eq!(h.manager.reconnect_attempts(), 2);
    assert_eq!(h.fire_pending(), Duration::from_millis(2000));

    // Attempt 2 opens; opening alone does not reset the counter
    let t3 = h.open_latest();
    assert_eq!(h.state(), ConnectionState::Handshaking);
    assert_eq!(h.manager.reconnect_attempts(), 2);

    h.frame(
        t3,
        json!({
            "type": "handshake_ack",
            "session_id": SESSION,
            "connection_id": "conn-3",
            "is_reconnect": true,
        }),
    );
    assert_eq!(h.state(), ConnectionState::Ready);
    assert_eq!(h.manager.reconnect_attempts(), 0);
    assert_eq!(h.manager.metrics().reconnect_count, 2);

    let events = h.drain_events();
    assert!(events.contains(&ClientEvent::Reconnecting {
        attempt: 1,
        delay: Duration::from_millis(1000),
    }));
    assert!(events.contains(&ClientEvent::Reconnecting {
        attempt: 2,
        delay: Duration::from_millis(2000),
    }));
    assert!(events.contains(&ClientEvent::Ready {
        connection_id: "conn-3".to_string(),
        is_reconnect: true,
    }));
}

#[test]
fn test_exhaustion_enters_error_until_explicit_connect() {
    verbose_println!("Testing reconnection exhaustion...");

    let mut h = Harness::new();
    h.ready(SESSION);
    h.close_latest("connection reset");

    let mut delays = Vec::new();
    for _ in 0..5 {
        delays.push(h.fire_pending().as_millis() as u64);
        h.close_latest("connection refused");
    }

    assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    assert_eq!(h.state(), ConnectionState::Error);
    assert_eq!(h.pending_timers(), 0);
    assert_eq!(h.wire.lock().opened.len(), 6);
    assert!(h
        .drain_events()
        .contains(&ClientEvent::ReconnectExhausted { attempts: 5 }));

    // send() in error state reports why the manager gave up
    let err = h.manager.send_user_message("anyone?", None).unwrap_err();
    assert_eq!(err, SessionError::ReconnectionExhausted { attempts: 5 });
    assert_eq!(h.wire.lock().opened.len(), 6);

    h.manager.connect(SESSION);
    assert_eq!(h.state(), ConnectionState::Connecting);
    assert_eq!(h.manager.reconnect_attempts(), 0);
    assert_eq!(h.wire.lock().opened.len(), 7);
}

#[test]
fn test_disconnect_mid_backoff_cancels_timer() {
    let mut h = Harness::new();
    h.ready(SESSION);
    h.close_latest("connection reset");

    let timer = *h.timers.lock().pending.keys().next().unwrap();
    h.manager.disconnect();

    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert_eq!(h.pending_timers(), 0);
    assert!(h.timers.lock().cancelled.contains(&timer));
    assert_eq!(h.manager.reconnect_attempts(), 0);

    // A timer that fired anyway is ignored
    h.manager.on_timer(timer);
    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert_eq!(h.wire.lock().opened.len(), 1);

    h.manager.connect(SESSION);
    assert_eq!(h.state(), ConnectionState::Connecting);
    assert_eq!(h.wire.lock().opened.len(), 2);
}

#[test]
fn test_disconnect_keeps_session_and_queue() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    let t1 = h.latest();
    h.manager.send_user_message("later", None).unwrap();

    h.manager.disconnect();
    assert_eq!(h.wire.lock().closed, vec![t1]);
    assert_eq!(h.manager.queued_len(), 1);
    assert_eq!(h.manager.session_id().map(SessionId::as_str), Some(SESSION));
    assert!(h.manager.connection_id().is_none());

    // Still queueable while disconnected
    h.manager.send_user_message("even later", None).unwrap();

    h.manager.connect(SESSION);
    let t2 = h.open_latest();
    h.ack(t2, SESSION, "conn-2");
    assert_eq!(
        h.wire.lock().sent_types(t2),
        vec!["handshake", "user_message", "user_message"]
    );
}

#[test]
fn test_error_frame_during_handshake_is_terminal() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    let t1 = h.open_latest();

    h.frame(
        t1,
        json!({"type": "error", "code": "invalid_session", "message": "unknown session"}),
    );

    assert_eq!(h.state(), ConnectionState::Error);
    assert_eq!(h.wire.lock().closed, vec![t1]);
    assert_eq!(h.pending_timers(), 0);
    assert!(h.drain_events().contains(&ClientEvent::HandshakeRejected {
        code: "invalid_session".to_string(),
        message: "unknown session".to_string(),
    }));

    h.manager.on_transport_closed(t1, "closed by peer".to_string());
    assert_eq!(h.state(), ConnectionState::Error);
    assert_eq!(h.pending_timers(), 0);
}

#[test]
fn test_send_after_rejected_handshake_reports_the_rejection() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    let t1 = h.open_latest();
    h.frame(
        t1,
        json!({"type": "error", "code": "invalid_session", "message": "unknown session"}),
    );

    let err = h.manager.send_user_message("hello?", None).unwrap_err();
    match err {
        SessionError::Handshake(reason) => {
            assert!(reason.contains("invalid_session"));
            assert!(reason.contains("unknown session"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // An explicit connect clears the failure
    h.manager.connect(SESSION);
    h.manager.send_user_message("hello?", None).unwrap();
    assert_eq!(h.state(), ConnectionState::Connecting);
}

#[test]
fn test_application_error_frame_does_not_force_reconnect() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut h = Harness::new();
    {
        let seen = Arc::clone(&seen);
        h.manager.subscribe(MessageKind::Error, move |message: &ServerMessage| -> sessionsockets::Result<()> {
            if let ServerMessage::Error(frame) = message {
                seen.lock().push(frame.code.clone());
            }
            Ok(())
        });
    }

    let t1 = h.ready(SESSION);
    h.frame(t1, json!({"type": "error", "code": "rate_limited", "message": "slow down"}));

    assert_eq!(h.state(), ConnectionState::Error);
    assert_eq!(*seen.lock(), vec!["rate_limited"]);
    assert!(h.wire.lock().closed.is_empty());
    assert!(h.manager.has_live_transport());

    // The peer hanging up afterwards does not start a retry
    h.manager.on_transport_closed(t1, "closed by peer".to_string());
    assert_eq!(h.state(), ConnectionState::Error);
    assert_eq!(h.pending_timers(), 0);
    assert_eq!(h.wire.lock().opened.len(), 1);
}

#[test]
fn test_ack_for_other_session_is_rejected() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    let t1 = h.open_latest();

    h.ack(t1, "someone-else", "conn-1");

    assert_eq!(h.state(), ConnectionState::Error);
    assert!(h.manager.connection_id().is_none());
    assert!(h.drain_events().iter().any(|e| matches!(
        e,
        ClientEvent::HandshakeRejected { code, .. } if code == "session_mismatch"
    )));
}

#[test]
fn test_handshake_timeout_retries() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    let t1 = h.open_latest();
    assert_eq!(h.pending_timers(), 1);

    let waited = h.fire_pending();
    assert_eq!(waited, DEFAULT_HANDSHAKE_TIMEOUT);
    assert_eq!(h.state(), ConnectionState::Reconnecting);
    assert_eq!(h.wire.lock().closed, vec![t1]);
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, ClientEvent::Error(msg) if msg.contains("timed out"))));

    assert_eq!(h.fire_pending(), Duration::from_millis(1000));
    assert_eq!(h.state(), ConnectionState::Connecting);
}

#[test]
fn test_handshake_timer_bounds_opening_step() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    let t1 = h.latest();

    // The peer never completes the upgrade, so no open ever arrives
    assert_eq!(h.state(), ConnectionState::Connecting);
    assert_eq!(h.pending_timers(), 1);

    assert_eq!(h.fire_pending(), DEFAULT_HANDSHAKE_TIMEOUT);
    assert_eq!(h.state(), ConnectionState::Reconnecting);
    assert_eq!(h.manager.reconnect_attempts(), 1);
    assert_eq!(h.wire.lock().closed, vec![t1]);
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, ClientEvent::Error(msg) if msg.contains("timed out"))));

    assert_eq!(h.fire_pending(), Duration::from_millis(1000));
    assert_eq!(h.state(), ConnectionState::Connecting);
    assert_ne!(h.latest(), t1);
}

#[test]
fn test_close_before_ack_cancels_handshake_timer_and_retries() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    h.open_latest();
    let handshake_timer = *h.timers.lock().pending.keys().next().unwrap();

    h.close_latest("connection reset");

    assert_eq!(h.state(), ConnectionState::Reconnecting);
    assert_eq!(h.manager.reconnect_attempts(), 1);
    assert_eq!(h.pending_timers(), 1);
    assert!(h.timers.lock().cancelled.contains(&handshake_timer));
    assert!(!h.timers.lock().pending.contains_key(&handshake_timer));
}

#[test]
fn test_undrained_events_keep_only_the_newest() {
    let mut h = Harness::with_config(ManagerConfig::default().event_capacity(3));
    h.ready(SESSION);
    h.manager.disconnect();
    h.manager.connect(SESSION);

    // Connecting, Handshaking and Ready were emitted first and pushed out
    let events = h.drain_events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], ClientEvent::Ready { .. }));
    assert_eq!(
        events[1..],
        [
            ClientEvent::StateChanged(ConnectionState::Disconnected),
            ClientEvent::StateChanged(ConnectionState::Connecting),
        ]
    );

    // Draining makes room again
    h.manager.disconnect();
    assert_eq!(
        h.drain_events(),
        vec![ClientEvent::StateChanged(ConnectionState::Disconnected)]
    );
}

#[test]
fn test_handshake_timeout_disabled() {
    let mut h = Harness::with_config(ManagerConfig::default().handshake_timeout(None));
    h.manager.connect(SESSION);
    h.open_latest();

    assert_eq!(h.pending_timers(), 0);
    assert_eq!(h.state(), ConnectionState::Handshaking);
}

#[test]
fn test_ack_cancels_handshake_timer() {
    let mut h = Harness::new();
    h.ready(SESSION);

    assert_eq!(h.pending_timers(), 0);
    assert_eq!(h.timers.lock().cancelled.len(), 1);
}

#[test]
fn test_stale_transport_events_are_ignored() {
    let mut h = Harness::new();
    let t1 = h.ready(SESSION);
    h.close_latest("connection reset");
    h.fire_pending();
    let t2 = h.latest();
    assert_ne!(t1, t2);

    h.manager.on_transport_open(t1);
    h.ack(t1, SESSION, "ghost");
    h.manager.on_transport_closed(t1, "late close".to_string());

    assert_eq!(h.state(), ConnectionState::Connecting);
    // Only the opening bound of the new transport
    assert_eq!(h.pending_timers(), 1);
    assert!(h.manager.connection_id().is_none());
}

#[test]
fn test_bad_frames_are_dropped_without_state_change() {
    let mut h = Harness::new();
    let t1 = h.ready(SESSION);

    h.manager.on_frame(t1, "not json at all");
    h.frame(t1, json!({"type": "mystery_kind", "x": 1}));
    h.frame(t1, json!({"content": "no type"}));
    h.frame(t1, json!({"type": "agent_response"}));

    let metrics = h.manager.metrics();
    assert_eq!(metrics.frames_dropped, 4);
    assert_eq!(metrics.frames_received, 5);
    assert_eq!(h.state(), ConnectionState::Ready);
}

#[test]
fn test_observers_isolated_through_manager() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let mut h = Harness::new();

    h.manager.subscribe(MessageKind::AgentResponse, |_: &ServerMessage| -> sessionsockets::Result<()> {
        Err(SessionError::Protocol("observer failed".to_string()))
    });
    h.manager.subscribe(MessageKind::AgentResponse, |_: &ServerMessage| -> sessionsockets::Result<()> {
        panic!("observer bug")
    });
    {
        let delivered = Arc::clone(&delivered);
        h.manager.subscribe(MessageKind::AgentResponse, move |message: &ServerMessage| -> sessionsockets::Result<()> {
            if let ServerMessage::AgentResponse(response) = message {
                delivered.lock().push(response.content.clone());
            }
            Ok(())
        });
    }

    let t1 = h.ready(SESSION);
    h.frame(t1, json!({"type": "agent_response", "content": "one", "is_final": true}));
    h.frame(t1, json!({"type": "agent_response", "content": "two", "is_final": true}));

    assert_eq!(*delivered.lock(), vec!["one", "two"]);
    assert_eq!(h.state(), ConnectionState::Ready);
}

#[test]
fn test_frames_before_ack_reach_observers() {
    let seen = Arc::new(Mutex::new(0usize));
    let mut h = Harness::new();
    {
        let seen = Arc::clone(&seen);
        h.manager.subscribe(MessageKind::Notification, move |_: &ServerMessage| -> sessionsockets::Result<()> {
            *seen.lock() += 1;
            Ok(())
        });
    }

    h.manager.connect(SESSION);
    let t1 = h.open_latest();
    h.frame(t1, json!({"type": "notification", "level": "info", "message": "warming up"}));

    assert_eq!(*seen.lock(), 1);
    assert_eq!(h.state(), ConnectionState::Handshaking);
}

#[test]
fn test_failed_send_keeps_frame_for_next_transport() {
    let mut h = Harness::new();
    let t1 = h.ready(SESSION);

    h.wire.lock().fail_send = true;
    let outcome = h.manager.send_user_message("survive", None).unwrap();

    assert_eq!(outcome, SendOutcome::Queued);
    assert_eq!(h.manager.queued_len(), 1);
    assert_eq!(h.state(), ConnectionState::Reconnecting);
    assert!(h.wire.lock().closed.contains(&t1));

    h.wire.lock().fail_send = false;
    h.fire_pending();
    let t2 = h.open_latest();
    h.ack(t2, SESSION, "conn-2");

    assert_eq!(h.wire.lock().sent_types(t2), vec!["handshake", "user_message"]);
    assert_eq!(h.wire.lock().sent_on(t2)[1]["message"], "survive");
}

#[test]
fn test_interrupted_flush_keeps_unsent_frames_in_order() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);
    for text in ["q1", "q2", "q3"] {
        h.manager.send(user_message(text)).unwrap();
    }
    let t1 = h.open_latest();

    h.wire.lock().send_budget = Some(1);
    h.ack(t1, SESSION, "conn-1");

    assert_eq!(h.state(), ConnectionState::Reconnecting);
    assert_eq!(h.manager.queued_len(), 2);
    assert!(!h
        .drain_events()
        .iter()
        .any(|e| matches!(e, ClientEvent::Ready { .. })));

    h.wire.lock().send_budget = None;
    h.fire_pending();
    let t2 = h.open_latest();
    h.ack(t2, SESSION, "conn-2");

    let bodies: Vec<_> = h
        .wire
        .lock()
        .sent_on(t2)
        .iter()
        .skip(1)
        .map(|f| f["message"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(bodies, vec!["q2", "q3"]);
}

#[test]
fn test_queue_capacity_rejects_new_messages() {
    let mut h = Harness::with_config(ManagerConfig::default().queue_capacity(Some(2)));
    h.manager.connect(SESSION);

    h.manager.send(user_message("1")).unwrap();
    h.manager.send(user_message("2")).unwrap();
    let err = h.manager.send(user_message("3")).unwrap_err();

    assert_eq!(err, SessionError::QueueFull { capacity: 2 });
    assert_eq!(h.manager.queued_len(), 2);
}

#[test]
fn test_handshake_cannot_be_sent_by_caller() {
    let mut h = Harness::new();
    h.manager.connect(SESSION);

    let err = h
        .manager
        .send(ClientMessage::Handshake(Handshake {
            session_id: SessionId::new(SESSION),
            client_type: "pwa".to_string(),
            client_version: None,
        }))
        .unwrap_err();

    assert!(matches!(err, SessionError::InvalidState(_)));
    assert_eq!(h.manager.queued_len(), 0);
}

#[test]
fn test_user_message_needs_a_session() {
    let mut h = Harness::new();
    let err = h.manager.send_user_message("hello?", None).unwrap_err();
    assert_eq!(err, SessionError::NoSession);
}

#[test]
fn test_tool_response_is_sent() {
    let mut h = Harness::new();
    let t1 = h.ready(SESSION);

    h.manager
        .send_tool_response("req-1", Err("engine offline".to_string()))
        .unwrap();

    let sent = h.wire.lock().sent_on(t1);
    let frame = &sent[1];
    assert_eq!(frame["type"], "tool_response");
    assert_eq!(frame["request_id"], "req-1");
    assert_eq!(frame["success"], false);
    assert_eq!(frame["error"], "engine offline");
}

#[test]
fn test_open_failure_schedules_retry() {
    let mut h = Harness::new();
    h.wire.lock().fail_open = true;

    h.manager.connect(SESSION);
    assert_eq!(h.state(), ConnectionState::Reconnecting);
    assert!(h.wire.lock().opened.is_empty());

    assert_eq!(h.fire_pending(), Duration::from_millis(1000));
    assert_eq!(h.wire.lock().opened.len(), 1);
    assert_eq!(h.state(), ConnectionState::Connecting);
}

#[test]
fn test_session_status_follows_frames() {
    let mut h = Harness::new();
    let t1 = h.ready(SESSION);

    h.frame(t1, json!({"type": "typing_indicator", "is_typing": true, "text": "composing"}));
    let status = h.manager.session_status();
    assert!(status.is_typing);
    assert_eq!(status.typing_text.as_deref(), Some("composing"));

    h.frame(
        t1,
        json!({"type": "session_status", "status": "generating", "progress": 0.25}),
    );
    h.frame(t1, json!({"type": "agent_response", "content": "done", "is_final": true}));

    let status = h.manager.session_status();
    assert!(!status.is_typing);
    assert_eq!(status.status.as_deref(), Some("generating"));
    assert_eq!(status.progress, Some(0.25));
}

#[test]
fn test_switching_session_resets_status() {
    let mut h = Harness::new();
    let t1 = h.ready("S1");
    h.frame(t1, json!({"type": "typing_indicator", "is_typing": true}));

    h.manager.connect("S2");
    assert_eq!(h.manager.session_status(), SessionStatus::default());
}

#[test]
fn test_unbounded_retries_keep_backoff_monotonic() {
    let mut h = Harness::with_config(ManagerConfig::default().reconnect_strategy(
        ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(2), None),
    ));
    h.ready(SESSION);
    h.close_latest("connection reset");

    let mut previous = Duration::ZERO;
    for _ in 0..10 {
        let delay = h.fire_pending();
        assert!(delay >= previous);
        previous = delay;
        h.close_latest("connection refused");
    }

    assert_eq!(previous, Duration::from_secs(2));
    assert_eq!(h.state(), ConnectionState::Reconnecting);
}
