//! Subscription handles and callback delivery
//!
//! Each subscription owns one spawned delivery task that drains the wrapped
//! client's subscriber and invokes the registered handler once per inbound
//! message, in the order the server delivered them. Handlers run on that
//! task, concurrently with the subscribing caller and with every other
//! subscription's task; the per-subscription delivery context is inherited
//! from the wrapped client, not re-implemented here.
//!
//! Handlers are held behind `Arc`, so whatever state they capture (the typed
//! user data) lives at least as long as the subscription that references it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::ClientHandle;
use crate::error::{Error, Status};
use crate::message::Message;

/// Asynchronous per-message callback.
///
/// Implementations may publish or request through [`Delivery::client`],
/// including replying to the received message. The handler is awaited before
/// the next message is delivered, which preserves per-subscription FIFO
/// order; slow handlers therefore delay later deliveries on the same
/// subscription only.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, delivery: Delivery);
}

/// Everything a handler invocation needs: the owning connection's handle,
/// a description of the subscription it arrived on, and the message itself.
/// The handler's own captured state supplies the typed user data.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Handle to the connection that owns the subscription.
    pub client: ClientHandle,
    /// The subscription this message arrived on. Inspectable only; a
    /// subscription cannot be destroyed from inside its own handler.
    pub subscription: SubscriptionInfo,
    /// The received message.
    pub message: Message,
}

impl Delivery {
    /// Publish a reply to the received message's reply subject.
    ///
    /// Fails with [`Status::InvalidArg`] if the message carries no reply
    /// subject, i.e. it was not a request.
    pub async fn respond(&self, payload: impl Into<bytes::Bytes>) -> Result<(), Error> {
        match self.message.reply() {
            Some(reply) => self.client.publish(reply, payload).await,
            None => Err(Error::new(
                Status::InvalidArg,
                format!(
                    "message on '{}' has no reply subject to respond to",
                    self.message.subject()
                ),
            )),
        }
    }
}

/// Immutable description of a live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    subject: String,
    id: u64,
}

impl SubscriptionInfo {
    pub(crate) fn new(subject: String, id: u64) -> Self {
        Self { subject, id }
    }

    /// The subject this subscription listens on.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Connection-local subscription id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Adapter turning an async closure into a [`MessageHandler`].
pub struct HandlerFn<F>(F);

/// Wrap `f` so it can be registered with
/// [`Connection::subscribe`](crate::Connection::subscribe).
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Delivery) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(Delivery) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn on_message(&self, delivery: Delivery) {
        (self.0)(delivery).await;
    }
}

/// One registered interest in a subject.
///
/// Move-only: destroying the subscription consumes the handle, so release
/// happens exactly once and use-after-release is a compile error. Dropping
/// without calling [`Subscription::unsubscribe`] still stops delivery, but
/// only `unsubscribe` guarantees the handler has fully stopped before
/// control returns.
#[derive(Debug)]
pub struct Subscription {
    info: SubscriptionInfo,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    delivered: Arc<AtomicU64>,
}

impl Subscription {
    pub(crate) fn spawn(
        client: ClientHandle,
        mut subscriber: async_nats::Subscriber,
        subject: String,
        id: u64,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let delivered = Arc::new(AtomicU64::new(0));
        let counter = delivered.clone();
        let info = SubscriptionInfo::new(subject, id);
        let task_info = info.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    inbound = subscriber.next() => {
                        match inbound {
                            Some(raw) => {
                                let delivery = Delivery {
                                    client: client.clone(),
                                    subscription: task_info.clone(),
                                    message: Message::from(raw),
                                };
                                handler.on_message(delivery).await;
                                counter.fetch_add(1, Ordering::Release);
                            }
                            None => {
                                debug!(
                                    subject = %task_info.subject(),
                                    "subscriber stream ended, stopping delivery"
                                );
                                break;
                            }
                        }
                    }
                }
            }
            if let Err(err) = subscriber.unsubscribe().await {
                debug!(
                    subject = %task_info.subject(),
                    error = %err,
                    "unsubscribe after delivery loop exit failed"
                );
            }
        });

        Self {
            info,
            shutdown: shutdown_tx,
            task: Some(task),
            delivered,
        }
    }

    /// The subject this subscription listens on.
    pub fn subject(&self) -> &str {
        self.info.subject()
    }

    /// Connection-local subscription id.
    pub fn id(&self) -> u64 {
        self.info.id()
    }

    /// Description of this subscription, as handlers see it.
    pub fn info(&self) -> &SubscriptionInfo {
        &self.info
    }

    /// Number of messages delivered to the handler so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    /// Stop delivery and release the subscription.
    ///
    /// Consumes the handle. When this returns, the handler has finished any
    /// in-flight invocation and will never be invoked again; the delivered
    /// count is final.
    pub async fn unsubscribe(mut self) -> Result<(), Error> {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                Error::new(
                    Status::Failure,
                    format!("delivery task for '{}' panicked: {e}", self.info.subject()),
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Stops the delivery task eventually; unlike unsubscribe() this does
        // not wait for it.
        let _ = self.shutdown.send(true);
    }
}
