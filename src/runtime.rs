//! Process-wide lifecycle state
//!
//! The wrapped client spawns background tasks per connection, so teardown
//! order matters: connections must be released before the process-level
//! shutdown is allowed to succeed. This module makes that ordering explicit
//! instead of relying on drop order: [`init`] before any connect,
//! [`shutdown`] (or [`shutdown_wait`]) after every connection is closed.
//! Double-init and shutdown-with-live-connections fail loudly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::Notify;
use tracing::info;

use crate::error::{Error, Status};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Name of the wrapped client library.
pub fn client_name() -> &'static str {
    "async-nats"
}

struct Registry {
    live: AtomicUsize,
    released: Notify,
}

enum LifecycleState {
    Idle,
    Running(Arc<Registry>),
}

static STATE: Lazy<Mutex<LifecycleState>> = Lazy::new(|| Mutex::new(LifecycleState::Idle));

fn lock_state() -> std::sync::MutexGuard<'static, LifecycleState> {
    // A poisoned lock only happens if a panic hit inside one of these short
    // critical sections; the state itself stays consistent.
    STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Initialize process-wide state. Must be called before any
/// [`Connection::connect`](crate::Connection::connect).
///
/// Fails with [`Status::AlreadyInitialized`] on a second call.
pub fn init() -> Result<(), Error> {
    let mut state = lock_state();
    match *state {
        LifecycleState::Running(_) => Err(Error::from_status(Status::AlreadyInitialized)),
        LifecycleState::Idle => {
            *state = LifecycleState::Running(Arc::new(Registry {
                live: AtomicUsize::new(0),
                released: Notify::new(),
            }));
            info!(version = version(), client = client_name(), "runtime initialized");
            Ok(())
        }
    }
}

/// Tear down process-wide state.
///
/// Fails with [`Status::NotInitialized`] if [`init`] was never called and
/// with [`Status::IllegalState`] if live connections remain; callers must
/// release every connection first (or use [`shutdown_wait`]).
pub fn shutdown() -> Result<(), Error> {
    let mut state = lock_state();
    match &*state {
        LifecycleState::Idle => Err(Error::from_status(Status::NotInitialized)),
        LifecycleState::Running(registry) => {
            let live = registry.live.load(Ordering::Acquire);
            if live > 0 {
                return Err(Error::new(
                    Status::IllegalState,
                    format!("shutdown refused: {live} connection(s) still live"),
                ));
            }
            *state = LifecycleState::Idle;
            info!("runtime shut down");
            Ok(())
        }
    }
}

/// Bounded drain-then-shutdown: wait up to `timeout` for every live
/// connection to be released, then tear down.
///
/// Fails with [`Status::Timeout`] if connections remain when the deadline
/// hits; the runtime stays initialized in that case.
pub async fn shutdown_wait(timeout: Duration) -> Result<(), Error> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let registry = match &*lock_state() {
            LifecycleState::Idle => return Err(Error::from_status(Status::NotInitialized)),
            LifecycleState::Running(registry) => registry.clone(),
        };

        // Arm the waiter before re-checking the count so a release between
        // the check and the await cannot be missed.
        let released = registry.released.notified();
        let live = registry.live.load(Ordering::Acquire);
        if live == 0 {
            return shutdown();
        }
        if tokio::time::timeout_at(deadline, released).await.is_err() {
            let live = registry.live.load(Ordering::Acquire);
            return Err(Error::timeout(format!(
                "{live} connection(s) still live after {timeout:?}"
            )));
        }
    }
}

/// True if [`init`] has been called and not yet shut down.
pub fn is_initialized() -> bool {
    matches!(&*lock_state(), LifecycleState::Running(_))
}

/// Number of connections currently registered.
pub fn live_connections() -> usize {
    match &*lock_state() {
        LifecycleState::Idle => 0,
        LifecycleState::Running(registry) => registry.live.load(Ordering::Acquire),
    }
}

/// Registration token held by every live [`Connection`](crate::Connection);
/// dropping it deregisters the connection.
pub(crate) struct ConnectionGuard {
    registry: Arc<Registry>,
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("live", &self.registry.live.load(Ordering::Acquire))
            .finish()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.live.fetch_sub(1, Ordering::AcqRel);
        self.registry.released.notify_waiters();
    }
}

/// Register a new connection with the runtime.
pub(crate) fn register_connection() -> Result<ConnectionGuard, Error> {
    match &*lock_state() {
        LifecycleState::Idle => Err(Error::new(
            Status::NotInitialized,
            "runtime::init must be called before connecting",
        )),
        LifecycleState::Running(registry) => {
            registry.live.fetch_add(1, Ordering::AcqRel);
            Ok(ConnectionGuard {
                registry: registry.clone(),
            })
        }
    }
}
