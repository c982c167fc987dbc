//! Broker round-trip tests
//!
//! These require a nats-server listening on 127.0.0.1:4222:
//!
//! ```bash
//! nats-server -p 4222 &
//! cargo test --test request_reply -- --ignored
//! ```
//!
//! They share the process-wide runtime and one broker, so they serialize on
//! a local lock and use distinct subjects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use courier::{handler_fn, runtime, BrokerConfig, Connection, Message, Status};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn broker_config() -> BrokerConfig {
    let mut config = BrokerConfig::single_server("nats://127.0.0.1:4222");
    config.connect_timeout_ms = 2000;
    config.request_timeout_ms = 2000;
    config
}

fn ensure_runtime() {
    if !runtime::is_initialized() {
        runtime::init().unwrap();
    }
}

async fn wait_for<F: Fn() -> bool>(what: &str, deadline: Duration, check: F) {
    let started = Instant::now();
    while !check() {
        assert!(
            started.elapsed() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
#[ignore] // Requires a running nats-server on 127.0.0.1:4222
async fn test_publish_subscribe_round_trip() {
    let _serial = serial();
    ensure_runtime();

    let conn = Connection::connect(&broker_config()).await.unwrap();

    let received: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let sub = conn
        .subscribe(
            "roundtrip.subject",
            Arc::new(handler_fn(move |delivery| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(delivery.message);
                }
            })),
        )
        .await
        .unwrap();

    conn.publish("roundtrip.subject", &b"greetings"[..])
        .await
        .unwrap();
    conn.flush().await.unwrap();

    wait_for("round-trip message", Duration::from_secs(2), || {
        !received.lock().unwrap().is_empty()
    })
    .await;

    let messages = received.lock().unwrap();
    assert_eq!(messages[0].subject(), "roundtrip.subject");
    assert_eq!(messages[0].data(), Some(&b"greetings"[..]));
    drop(messages);

    sub.unsubscribe().await.unwrap();
    conn.close().await.unwrap();
    runtime::shutdown_wait(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a running nats-server on 127.0.0.1:4222
async fn test_zero_length_payload_arrives_present_and_empty() {
    let _serial = serial();
    ensure_runtime();

    let conn = Connection::connect(&broker_config()).await.unwrap();

    let received: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let sub = conn
        .subscribe(
            "roundtrip.empty",
            Arc::new(handler_fn(move |delivery| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(delivery.message);
                }
            })),
        )
        .await
        .unwrap();

    // Absent payload locally; on the wire it becomes a zero-length payload
    // and must arrive present-empty, never absent.
    conn.publish_msg(&Message::new("roundtrip.empty")).await.unwrap();
    conn.flush().await.unwrap();

    wait_for("empty-payload message", Duration::from_secs(2), || {
        !received.lock().unwrap().is_empty()
    })
    .await;

    assert_eq!(received.lock().unwrap()[0].data(), Some(&[][..]));

    sub.unsubscribe().await.unwrap();
    conn.close().await.unwrap();
    runtime::shutdown_wait(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a running nats-server on 127.0.0.1:4222
async fn test_request_with_no_subscriber_fails_within_bounds() {
    let _serial = serial();
    ensure_runtime();

    let conn = Connection::connect(&broker_config()).await.unwrap();

    let started = Instant::now();
    let err = conn
        .request_with_timeout("nobody.home", &b"anyone?"[..], Duration::from_millis(500))
        .await
        .unwrap_err();

    assert!(
        matches!(err.status(), Status::NoResponders | Status::Timeout),
        "unexpected status: {}",
        err.status()
    );
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "request hung for {:?}",
        started.elapsed()
    );

    conn.close().await.unwrap();
    runtime::shutdown_wait(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a running nats-server on 127.0.0.1:4222
async fn test_unsubscribe_stops_delivery() {
    let _serial = serial();
    ensure_runtime();

    let conn = Connection::connect(&broker_config()).await.unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let sub = conn
        .subscribe(
            "stops.delivery",
            Arc::new(handler_fn(move |_delivery| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })),
        )
        .await
        .unwrap();

    for _ in 0..5 {
        conn.publish("stops.delivery", &b"tick"[..]).await.unwrap();
    }
    conn.flush().await.unwrap();
    wait_for("five deliveries", Duration::from_secs(2), || {
        calls.load(Ordering::SeqCst) == 5
    })
    .await;

    // Synchronization barrier: unsubscribe only returns once the handler
    // can never run again.
    sub.unsubscribe().await.unwrap();
    let after_unsubscribe = calls.load(Ordering::SeqCst);

    for _ in 0..5 {
        conn.publish("stops.delivery", &b"tock"[..]).await.unwrap();
    }
    conn.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(calls.load(Ordering::SeqCst), after_unsubscribe);

    conn.close().await.unwrap();
    runtime::shutdown_wait(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a running nats-server on 127.0.0.1:4222
async fn test_request_reply_scenario() {
    let _serial = serial();
    ensure_runtime();

    let conn = Connection::connect(&broker_config()).await.unwrap();

    // Handler inspects the inbound request and answers on its reply subject.
    let sub = conn
        .subscribe(
            "channel",
            Arc::new(handler_fn(|delivery: courier::Delivery| async move {
                assert_eq!(delivery.subscription.subject(), "channel");
                if delivery.message.data() == Some(&b"greetings"[..]) {
                    delivery.respond(&b"salutations"[..]).await.unwrap();
                }
            })),
        )
        .await
        .unwrap();

    let reply = conn
        .request_with_timeout("channel", &b"greetings"[..], Duration::from_millis(1000))
        .await
        .unwrap();
    assert_eq!(reply.data(), Some(&b"salutations"[..]));

    let stats = conn.statistics().snapshot();
    assert!(stats.messages_out >= 1);
    assert!(stats.messages_in >= 1);
    assert_eq!(stats.reconnects, 0);

    sub.unsubscribe().await.unwrap();
    conn.close().await.unwrap();
    runtime::shutdown_wait(Duration::from_secs(5)).await.unwrap();
}
