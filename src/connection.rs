//! Connection ownership and core client operations
//!
//! [`Connection`] is the move-only owner of one live session: it registers
//! with the process runtime on connect and deregisters on close/drop.
//! [`ClientHandle`] is the cheap cloneable view carrying the operations that
//! are safe to share (publish, request, flush), which is what delivery
//! callbacks receive. The wrapped client serializes concurrent publishes and
//! requests at the socket, so a single connection is safe to use from many
//! tasks at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_nats::ConnectOptions;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{AuthMode, BrokerConfig};
use crate::creds;
use crate::error::{Error, Status};
use crate::message::{validate_subject, Message};
use crate::runtime;
use crate::stats::Statistics;
use crate::subscription::{MessageHandler, Subscription};

/// Connection state as observed from the wrapped client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected and operating normally.
    Connected,
    /// Connection lost; the client is reconnecting internally.
    Reconnecting,
    /// No connection.
    Disconnected,
}

/// Cloneable view over a live connection.
///
/// Every clone talks to the same session; cloning never creates a new
/// connection or transfers ownership.
#[derive(Clone)]
pub struct ClientHandle {
    client: async_nats::Client,
    request_timeout: Duration,
}

impl ClientHandle {
    pub(crate) fn new(client: async_nats::Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// Fire-and-forget publish of a raw payload.
    pub async fn publish(&self, subject: &str, payload: impl Into<Bytes>) -> Result<(), Error> {
        validate_subject(subject)?;
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(Error::from)
    }

    /// Publish a [`Message`], honoring its reply subject and payload
    /// absence (absent maps to an empty wire payload).
    pub async fn publish_msg(&self, message: &Message) -> Result<(), Error> {
        validate_subject(message.subject())?;
        let payload = message
            .data()
            .map(Bytes::copy_from_slice)
            .unwrap_or_default();
        match message.reply() {
            Some(reply) => {
                validate_subject(reply)?;
                self.client
                    .publish_with_reply(message.subject().to_string(), reply.to_string(), payload)
                    .await
                    .map_err(Error::from)
            }
            None => self
                .client
                .publish(message.subject().to_string(), payload)
                .await
                .map_err(Error::from),
        }
    }

    /// Send a request and suspend until exactly one reply arrives or the
    /// deadline elapses.
    ///
    /// Timeout maps to [`Status::Timeout`]; a delivered request with nobody
    /// listening maps to [`Status::NoResponders`]. The waiter is completed
    /// by the client's delivery machinery, never polled.
    pub async fn request(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Message, Error> {
        validate_subject(subject)?;
        let response = tokio::time::timeout(
            timeout,
            self.client.request(subject.to_string(), payload.into()),
        )
        .await
        .map_err(|_| {
            Error::timeout(format!("request to '{subject}' timed out after {timeout:?}"))
        })?
        .map_err(Error::from)?;
        Ok(Message::from(response))
    }

    /// Flush buffered outbound messages to the server.
    pub async fn flush(&self) -> Result<(), Error> {
        self.client
            .flush()
            .await
            .map_err(|e| Error::new(Status::Failure, format!("flush failed: {e}")))
    }

    /// A fresh, unique inbox subject for manual request correlation.
    pub fn new_inbox(&self) -> String {
        self.client.new_inbox()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        match self.client.connection_state() {
            async_nats::connection::State::Connected => ConnectionState::Connected,
            async_nats::connection::State::Pending => ConnectionState::Reconnecting,
            async_nats::connection::State::Disconnected => ConnectionState::Disconnected,
        }
    }

    /// The default request timeout configured at connect time.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub(crate) fn raw(&self) -> &async_nats::Client {
        &self.client
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("state", &self.state())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Build connect options from broker configuration, applying the selected
/// auth mode and TLS settings. Pure pass-through; no policy lives here.
async fn build_connect_options(config: &BrokerConfig) -> Result<ConnectOptions, Error> {
    let mut opts = ConnectOptions::new();

    match config.auth.mode {
        AuthMode::None => {}
        AuthMode::UserPassword => {
            // validate() guarantees both fields are present
            let user = config.auth.username.clone().unwrap_or_default();
            let pass = config.auth.password.clone().unwrap_or_default();
            opts = opts.user_and_password(user, pass);
        }
        AuthMode::Token => {
            let token = config.auth.token.clone().unwrap_or_default();
            opts = opts.token(token);
        }
        AuthMode::Nkey => {
            let seed_path = config.auth.nkey_seed_path.as_ref().ok_or_else(|| {
                Error::invalid_arg("nkey auth requires 'nkey_seed_path'")
            })?;
            let seed = creds::load_seed_file(seed_path)?;
            opts = opts.nkey(seed);
        }
        AuthMode::CredsFile => {
            let creds_path = config.auth.creds_file_path.as_ref().ok_or_else(|| {
                Error::invalid_arg("creds_file auth requires 'creds_file_path'")
            })?;
            opts = opts.credentials_file(creds_path).await.map_err(|e| {
                Error::invalid_arg(format!(
                    "failed to load credentials file '{}': {e}",
                    creds_path.display()
                ))
            })?;
        }
    }

    if let (Some(cert), Some(key)) = (&config.tls.cert_path, &config.tls.key_path) {
        opts = opts.add_client_certificate(cert.clone(), key.clone());
        opts = opts.require_tls(true);
    }
    if let Some(ca) = &config.tls.ca_path {
        opts = opts.add_root_certificates(ca.clone());
        opts = opts.require_tls(true);
    }
    if config.tls.require_tls {
        opts = opts.require_tls(true);
    }

    if let Some(name) = &config.name {
        opts = opts.name(name.clone());
    }
    if let Some(max) = config.max_reconnects {
        opts = opts.max_reconnects(max);
    }
    opts = opts
        .connection_timeout(config.connect_timeout())
        .ping_interval(config.ping_interval())
        .request_timeout(Some(config.request_timeout()))
        .subscription_capacity(config.subscription_capacity)
        .event_callback(|event| async move {
            debug!(event = %event, "client connection event");
        });
    if config.retry_on_initial_connect {
        opts = opts.retry_on_initial_connect();
    }

    Ok(opts)
}

/// One live session to a broker.
///
/// Move-only owner: closing consumes the value, so a connection is released
/// exactly once and operations on a released connection are compile errors.
/// Requires [`runtime::init`](crate::runtime::init) to have been called.
#[derive(Debug)]
pub struct Connection {
    handle: ClientHandle,
    next_sid: AtomicU64,
    _guard: runtime::ConnectionGuard,
}

impl Connection {
    /// Establish a session using the given configuration.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, Error> {
        config.validate()?;
        let guard = runtime::register_connection()?;

        let opts = build_connect_options(config).await?;
        let client = opts
            .connect(config.servers.clone())
            .await
            .map_err(Error::from)?;

        info!(servers = ?config.servers, "connection established");
        Ok(Self {
            handle: ClientHandle::new(client, config.request_timeout()),
            next_sid: AtomicU64::new(1),
            _guard: guard,
        })
    }

    /// A cloneable handle to this connection for use from other tasks.
    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Fire-and-forget publish. See [`ClientHandle::publish`].
    pub async fn publish(&self, subject: &str, payload: impl Into<Bytes>) -> Result<(), Error> {
        self.handle.publish(subject, payload).await
    }

    /// Publish a [`Message`]. See [`ClientHandle::publish_msg`].
    pub async fn publish_msg(&self, message: &Message) -> Result<(), Error> {
        self.handle.publish_msg(message).await
    }

    /// Request with the configured default timeout.
    pub async fn request(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
    ) -> Result<Message, Error> {
        let timeout = self.handle.request_timeout();
        self.handle.request(subject, payload, timeout).await
    }

    /// Request with an explicit timeout.
    pub async fn request_with_timeout(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Message, Error> {
        self.handle.request(subject, payload, timeout).await
    }

    /// Flush buffered outbound messages.
    pub async fn flush(&self) -> Result<(), Error> {
        self.handle.flush().await
    }

    /// A fresh, unique inbox subject.
    pub fn new_inbox(&self) -> String {
        self.handle.new_inbox()
    }

    /// Register an asynchronous handler invoked once per inbound message
    /// matching `subject`, in server delivery order.
    ///
    /// The handler runs on a delivery task owned by the returned
    /// [`Subscription`], concurrently with the caller. The `Arc` keeps the
    /// handler's captured state alive for the subscription's lifetime.
    pub async fn subscribe<H>(
        &self,
        subject: impl Into<String>,
        handler: Arc<H>,
    ) -> Result<Subscription, Error>
    where
        H: MessageHandler + 'static,
    {
        let subject = subject.into();
        validate_subject(&subject)?;
        let subscriber = self
            .handle
            .raw()
            .subscribe(subject.clone())
            .await
            .map_err(|e| {
                Error::new(
                    Status::Failure,
                    format!("subscribe to '{subject}' failed: {e}"),
                )
            })?;
        let sid = self.next_sid.fetch_add(1, Ordering::Relaxed);
        debug!(subject = %subject, sid, "subscription registered");
        Ok(Subscription::spawn(
            self.handle.clone(),
            subscriber,
            subject,
            sid,
            handler,
        ))
    }

    /// Statistics counters for this connection.
    pub fn statistics(&self) -> Statistics {
        Statistics::new(self.handle.raw().statistics())
    }

    /// Release the connection.
    ///
    /// Safe to call regardless of connection state and bounded in time: a
    /// short best-effort flush, then teardown. Requests still in flight on
    /// clones of the handle are not cancelled; each resolves within its own
    /// request timeout. Use [`Connection::close_timeout`] to drain first.
    pub async fn close(self) -> Result<(), Error> {
        if let Ok(Err(err)) =
            tokio::time::timeout(Duration::from_secs(2), self.handle.flush()).await
        {
            debug!(error = %err, "flush during close failed");
        }
        info!("connection closed");
        Ok(())
    }

    /// Drain-then-close variant with an explicit bound.
    ///
    /// Stops new work, waits up to `timeout` for buffered and in-flight
    /// traffic to settle, then releases the connection. Fails with
    /// [`Status::Timeout`] if draining does not finish in time; the
    /// connection is released regardless.
    pub async fn close_timeout(self, timeout: Duration) -> Result<(), Error> {
        match tokio::time::timeout(timeout, self.handle.raw().drain()).await {
            Ok(Ok(())) => {
                info!("connection drained and closed");
                Ok(())
            }
            Ok(Err(err)) => Err(Error::new(
                Status::Failure,
                format!("drain failed: {err}"),
            )),
            Err(_) => {
                warn!(?timeout, "drain did not finish before deadline");
                Err(Error::timeout(format!(
                    "connection drain exceeded {timeout:?}"
                )))
            }
        }
    }
}
