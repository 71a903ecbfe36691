#![allow(clippy::unwrap_used)]
// Integration tests for the dispatch engine against wiremock gateways.
//
// The inter-send delay is shortened to keep the suite fast; the delay
// duration itself is configuration, not behavior under test.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rutly_api::GatewayClient;
use rutly_core::{
    Dispatcher, GatewayEntry, GatewayRegistry, SendStatus, RETRY_CEILING,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Mock device that logs in successfully and accepts every send.
async fn healthy_gateway() -> MockServer {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/messages/actions/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "sms_used": 1 }
        })))
        .mount(&server)
        .await;
    server
}

/// Mock device that logs in successfully but rejects every send.
async fn rejecting_gateway() -> MockServer {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/messages/actions/send"))
        .respond_with(ResponseTemplate::new(500).set_body_string("modem busy"))
        .mount(&server)
        .await;
    server
}

/// Mock device whose login always fails.
async fn unauthenticated_gateway() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{ "error": "Incorrect password" }]
        })))
        .mount(&server)
        .await;
    server
}

async fn mount_login_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "token": "test-token", "expires": 299 }
        })))
        .mount(server)
        .await;
}

fn registry_for(servers: &[&MockServer]) -> GatewayRegistry {
    let entries = servers
        .iter()
        .map(|server| GatewayEntry {
            url: server.uri(),
            username: "admin".to_string(),
            password: secrecy::SecretString::from("pw".to_string()),
            modem: None,
        })
        .collect();
    GatewayRegistry::from_entries(entries).unwrap()
}

fn dispatcher(registry: GatewayRegistry) -> Dispatcher {
    let client = GatewayClient::with_client(reqwest::Client::new());
    Dispatcher::new(registry, client, Duration::from_millis(5))
}

async fn run_to_idle(dispatcher: &Dispatcher) {
    let handle = dispatcher.drain_if_idle().expect("engine should be idle");
    handle.await.unwrap();
}

// ── Happy path ──────────────────────────────────────────────────────

#[tokio::test]
async fn single_message_is_sent_and_logged() {
    let server = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&server]));

    engine.enqueue("+15551234567", "hello");
    run_to_idle(&engine).await;

    let log = engine.snapshot_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, SendStatus::Sent);
    assert_eq!(log[0].to, "+15551234567");
    assert_eq!(log[0].gateway, 1);
    assert_eq!(engine.queue_len(), 0);
    assert!(!engine.is_draining());
}

#[tokio::test]
async fn successful_login_stores_token_on_gateway() {
    let server = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&server]));

    assert_eq!(engine.registry().get(0).unwrap().token(), None);

    engine.enqueue("+15551234567", "hello");
    run_to_idle(&engine).await;

    let stored = engine.registry().get(0).unwrap().token();
    assert_eq!(stored, Some("test-token".to_string()));
}

#[tokio::test]
async fn two_messages_are_processed_in_enqueue_order() {
    let server = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&server]));

    engine.enqueue("+1", "first");
    engine.enqueue("+2", "second");
    run_to_idle(&engine).await;

    // snapshot_log is newest-first; reverse for send order.
    let mut log = engine.snapshot_log();
    log.reverse();
    let order: Vec<_> = log.iter().map(|e| e.to.as_str()).collect();
    assert_eq!(order, ["+1", "+2"]);
    assert!(log.iter().all(|e| e.status == SendStatus::Sent));
}

// ── Single-drain-loop guarantee ─────────────────────────────────────

#[tokio::test]
async fn second_drain_is_refused_while_one_is_active() {
    let server = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&server]));

    engine.enqueue("+1", "a");
    engine.enqueue("+2", "b");

    let first = engine.drain_if_idle();
    assert!(first.is_some());
    // The flag is taken synchronously in drain_if_idle, so a second
    // caller loses the race immediately.
    assert!(engine.drain_if_idle().is_none());

    first.unwrap().await.unwrap();
    assert_eq!(engine.snapshot_log().len(), 2);

    // Once idle, a new loop may start again.
    engine.enqueue("+3", "c");
    assert!(engine.drain_if_idle().is_some());
}

// ── Rotation ────────────────────────────────────────────────────────

#[tokio::test]
async fn rotation_advances_once_per_iteration() {
    let first = healthy_gateway().await;
    let second = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&first, &second]));

    engine.enqueue("+1", "a");
    engine.enqueue("+2", "b");
    engine.enqueue("+3", "c");
    run_to_idle(&engine).await;

    let mut log = engine.snapshot_log();
    log.reverse();
    let gateways: Vec<_> = log.iter().map(|e| e.gateway).collect();
    assert_eq!(gateways, [1, 2, 1]);
    // Three iterations from index 0 across two devices.
    assert_eq!(engine.rotation_index(), 1);
}

// ── Retry policy ────────────────────────────────────────────────────

#[tokio::test]
async fn failed_login_retries_then_drops() {
    let server = unauthenticated_gateway().await;
    let engine = dispatcher(registry_for(&[&server]));

    engine.enqueue("+15551234567", "hello");
    run_to_idle(&engine).await;

    // Original attempt + 3 retries, all authentication failures.
    let mut log = engine.snapshot_log();
    log.reverse();
    assert_eq!(log.len(), usize::try_from(RETRY_CEILING + 1).unwrap());
    for (attempt, entry) in log.iter().enumerate() {
        assert_eq!(
            entry.status,
            SendStatus::Error {
                retry: u32::try_from(attempt).unwrap()
            }
        );
    }
    assert_eq!(engine.queue_len(), 0);
    assert!(!engine.is_draining());
}

#[tokio::test]
async fn retry_fails_over_to_next_gateway() {
    let flaky = rejecting_gateway().await;
    let healthy = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&flaky, &healthy]));

    engine.enqueue("+15551234567", "hello");
    run_to_idle(&engine).await;

    let mut log = engine.snapshot_log();
    log.reverse();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].status, SendStatus::Error { retry: 0 });
    assert_eq!(log[0].gateway, 1);
    assert_eq!(log[1].status, SendStatus::Sent);
    assert_eq!(log[1].gateway, 2);
}

#[tokio::test]
async fn retried_message_jumps_the_backlog() {
    let flaky = rejecting_gateway().await;
    let healthy = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&flaky, &healthy]));

    engine.enqueue("+1", "first");
    engine.enqueue("+2", "second");
    run_to_idle(&engine).await;

    // "first" fails on gateway 1, is reinserted at the front, and is
    // sent on gateway 2 before "second" gets a turn.
    let mut log = engine.snapshot_log();
    log.reverse();
    let attempts: Vec<_> = log
        .iter()
        .map(|e| (e.to.as_str(), e.status.clone(), e.gateway))
        .collect();
    assert_eq!(
        attempts,
        [
            ("+1", SendStatus::Error { retry: 0 }, 1),
            ("+1", SendStatus::Sent, 2),
            ("+2", SendStatus::Error { retry: 0 }, 1),
            ("+2", SendStatus::Sent, 2),
        ]
    );
}

// ── Inter-send throttling ───────────────────────────────────────────

/// Dispatcher whose HTTP client keeps no idle-pool timers, so under a
/// paused clock the only timers that can advance virtual time are the
/// engine's own inter-send sleeps.
fn throttled_dispatcher(registry: GatewayRegistry, delay: Duration) -> Dispatcher {
    let http = reqwest::Client::builder()
        .pool_idle_timeout(None)
        .build()
        .unwrap();
    Dispatcher::new(registry, GatewayClient::with_client(http), delay)
}

#[tokio::test(start_paused = true)]
async fn delay_elapses_exactly_once_between_two_messages() {
    let throttle = Duration::from_millis(3000);
    let server = healthy_gateway().await;
    let engine = throttled_dispatcher(registry_for(&[&server]), throttle);

    engine.enqueue("+1", "first");
    engine.enqueue("+2", "second");

    let started = tokio::time::Instant::now();
    run_to_idle(&engine).await;

    // One pause between the two iterations, none after the last.
    assert_eq!(started.elapsed(), throttle);

    let mut log = engine.snapshot_log();
    log.reverse();
    let order: Vec<_> = log.iter().map(|e| e.to.as_str()).collect();
    assert_eq!(order, ["+1", "+2"]);
}

#[tokio::test(start_paused = true)]
async fn no_delay_after_the_final_message() {
    let server = healthy_gateway().await;
    let engine = throttled_dispatcher(registry_for(&[&server]), Duration::from_millis(3000));

    engine.enqueue("+15551234567", "hello");

    let started = tokio::time::Instant::now();
    run_to_idle(&engine).await;

    // A single message never touches the throttle.
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(engine.snapshot_log().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_are_throttled_like_any_other_iteration() {
    let throttle = Duration::from_millis(3000);
    let server = unauthenticated_gateway().await;
    let engine = throttled_dispatcher(registry_for(&[&server]), throttle);

    engine.enqueue("+15551234567", "hello");

    let started = tokio::time::Instant::now();
    run_to_idle(&engine).await;

    // Four attempts (original + 3 retries) with a pause after each one
    // that leaves the queue non-empty; the drop itself is not throttled.
    assert_eq!(started.elapsed(), throttle * RETRY_CEILING);
    assert_eq!(engine.snapshot_log().len(), 4);
}

// ── Log operations ──────────────────────────────────────────────────

#[tokio::test]
async fn clearing_log_leaves_queue_and_rotation_alone() {
    let server = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&server]));

    engine.enqueue("+1", "a");
    run_to_idle(&engine).await;
    assert_eq!(engine.snapshot_log().len(), 1);

    let rotation_before = engine.rotation_index();
    engine.clear_log();

    assert!(engine.snapshot_log().is_empty());
    assert_eq!(engine.queue_len(), 0);
    assert_eq!(engine.rotation_index(), rotation_before);
}

#[tokio::test]
async fn enqueue_while_idle_then_drain_processes_everything() {
    let server = healthy_gateway().await;
    let engine = dispatcher(registry_for(&[&server]));

    for i in 0..5 {
        engine.enqueue(format!("+{i}"), "msg");
    }
    run_to_idle(&engine).await;

    assert_eq!(engine.snapshot_log().len(), 5);
    assert_eq!(engine.queue_len(), 0);
}
