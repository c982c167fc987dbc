//! courier - pub/sub and request/reply client layer over NATS
//!
//! This crate is a thin ownership, error, and lifecycle layer over the
//! `async-nats` client. It does not implement the broker protocol, wire
//! framing, reconnection, or subscription dispatch - all of that is the
//! wrapped client's job. What it adds:
//!
//! - a single [`Status`]/[`Error`] space every operation reports through,
//! - move-only [`Connection`] and [`Subscription`] handles so release
//!   happens exactly once, enforced at compile time,
//! - typed callback delivery via [`MessageHandler`] / [`handler_fn`],
//! - [`Message`] values that keep "no payload" distinct from "empty
//!   payload",
//! - explicit process lifecycle in [`runtime`] with double-init and
//!   live-connection teardown guards.
//!
//! # Quick Start
//!
//! ```no_run
//! use courier::{handler_fn, runtime, BrokerConfig, Connection};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), courier::Error> {
//! runtime::init()?;
//!
//! let config = BrokerConfig::single_server("nats://127.0.0.1:4222");
//! let conn = Connection::connect(&config).await?;
//!
//! let sub = conn
//!     .subscribe(
//!         "channel",
//!         Arc::new(handler_fn(|delivery| async move {
//!             let _ = delivery.respond(&b"salutations"[..]).await;
//!         })),
//!     )
//!     .await?;
//!
//! let reply = conn
//!     .request_with_timeout("channel", "greetings", Duration::from_secs(1))
//!     .await?;
//! assert_eq!(reply.data(), Some(&b"salutations"[..]));
//!
//! sub.unsubscribe().await?;
//! conn.close().await?;
//! runtime::shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod creds;
pub mod error;
pub mod logging;
pub mod message;
pub mod runtime;
pub mod stats;
pub mod subscription;

pub use config::{AuthMode, AuthSection, BrokerConfig, TlsSection};
pub use connection::{ClientHandle, Connection, ConnectionState};
pub use error::{ClientResult, Error, Status};
pub use message::{validate_subject, Message};
pub use stats::{Statistics, StatsSnapshot};
pub use subscription::{handler_fn, Delivery, MessageHandler, Subscription, SubscriptionInfo};
