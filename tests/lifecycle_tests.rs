//! Lifecycle tests that need no broker
//!
//! Covers runtime init/shutdown ordering and fast connect failure. These
//! tests share the process-wide runtime state, so they serialize on a local
//! lock.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use courier::{runtime, BrokerConfig, Connection, Status};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unreachable_config() -> BrokerConfig {
    // Port 9 (discard) refuses connections immediately on loopback.
    let mut config = BrokerConfig::single_server("nats://127.0.0.1:9");
    config.connect_timeout_ms = 500;
    config
}

#[tokio::test]
async fn test_connect_before_init_is_refused() {
    let _serial = serial();
    while runtime::is_initialized() {
        runtime::shutdown().expect("no connections live in this test");
    }

    let err = Connection::connect(&unreachable_config()).await.unwrap_err();
    assert_eq!(err.status(), Status::NotInitialized);
}

#[tokio::test]
async fn test_failed_connect_is_bounded_and_leaves_no_live_connection() {
    let _serial = serial();
    if !runtime::is_initialized() {
        runtime::init().unwrap();
    }

    let started = Instant::now();
    let err = Connection::connect(&unreachable_config()).await.unwrap_err();
    assert!(
        matches!(
            err.status(),
            Status::ConnectionFailed | Status::Timeout
        ),
        "unexpected status: {}",
        err.status()
    );
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "connect failure took {:?}",
        started.elapsed()
    );

    // The registration guard must not leak on failure.
    assert_eq!(runtime::live_connections(), 0);
    runtime::shutdown().unwrap();
}

#[tokio::test]
async fn test_shutdown_wait_without_connections_completes_immediately() {
    let _serial = serial();
    if !runtime::is_initialized() {
        runtime::init().unwrap();
    }

    let started = Instant::now();
    runtime::shutdown_wait(Duration::from_secs(5)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!runtime::is_initialized());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_any_io() {
    let _serial = serial();
    if !runtime::is_initialized() {
        runtime::init().unwrap();
    }

    let mut config = BrokerConfig::default();
    config.servers.clear();
    let err = Connection::connect(&config).await.unwrap_err();
    assert_eq!(err.status(), Status::InvalidArg);
    assert_eq!(runtime::live_connections(), 0);

    runtime::shutdown().unwrap();
}
