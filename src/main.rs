//! courier demo CLI
//!
//! Small command-line front end over the library: publish, subscribe,
//! request, and run an echo-style responder against a broker.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use courier::{handler_fn, logging, runtime, BrokerConfig, Connection};
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info};

/// Pub/sub and request/reply client for NATS brokers
#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Pub/sub and request/reply client for NATS brokers")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Broker URL, overriding any configuration file
    #[arg(short, long, env = "COURIER_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a payload to a subject
    Pub {
        subject: String,
        /// Payload bytes; omit to publish a message with no payload
        payload: Option<String>,
        /// Reply subject to attach, marking the message as a request
        #[arg(long)]
        reply: Option<String>,
    },
    /// Print messages arriving on a subject
    Sub {
        subject: String,
        /// Stop after this many messages
        #[arg(long)]
        max: Option<u64>,
    },
    /// Send a request and print the reply
    Request {
        subject: String,
        payload: String,
        /// Timeout in milliseconds
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
    /// Answer every request on a subject with a fixed response
    Reply {
        subject: String,
        response: String,
    },
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_default_logging();

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, config).await {
        error!("command failed: {e}");
        process::exit(1);
    }
}

fn load_configuration(cli: &Cli) -> Result<BrokerConfig, courier::Error> {
    if let Some(server) = &cli.server {
        let config = BrokerConfig::single_server(server.clone());
        config.validate()?;
        return Ok(config);
    }
    if let Some(path) = &cli.config {
        info!("loading configuration from {}", path.display());
        return BrokerConfig::load_from_file(path);
    }
    for candidate in ["courier.toml", "config/courier.toml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            info!("loading configuration from {}", path.display());
            return BrokerConfig::load_from_file(&path);
        }
    }
    Ok(BrokerConfig::default())
}

async fn run(command: Commands, config: BrokerConfig) -> Result<(), courier::Error> {
    if let Commands::Config { show } = &command {
        if *show {
            println!(
                "{}",
                toml::to_string_pretty(&config)
                    .map_err(|e| courier::Error::invalid_arg(e.to_string()))?
            );
        }
        info!("configuration is valid");
        return Ok(());
    }

    runtime::init()?;
    let conn = Connection::connect(&config).await?;

    let result = match command {
        Commands::Pub {
            subject,
            payload,
            reply,
        } => publish(&conn, subject, payload, reply).await,
        Commands::Sub { subject, max } => subscribe(&conn, subject, max).await,
        Commands::Request {
            subject,
            payload,
            timeout_ms,
        } => request(&conn, subject, payload, timeout_ms).await,
        Commands::Reply { subject, response } => reply(&conn, subject, response).await,
        Commands::Config { .. } => unreachable!("handled before connecting"),
    };

    conn.close().await?;
    runtime::shutdown_wait(Duration::from_secs(5)).await?;
    result
}

async fn publish(
    conn: &Connection,
    subject: String,
    payload: Option<String>,
    reply: Option<String>,
) -> Result<(), courier::Error> {
    let mut message = match payload {
        Some(payload) => courier::Message::with_payload(&subject, payload),
        None => courier::Message::new(&subject),
    };
    if let Some(reply) = reply {
        message = message.reply_to(reply);
    }
    conn.publish_msg(&message).await?;
    conn.flush().await?;
    info!(subject = %subject, bytes = message.len(), "published");
    Ok(())
}

async fn subscribe(
    conn: &Connection,
    subject: String,
    max: Option<u64>,
) -> Result<(), courier::Error> {
    let received = Arc::new(AtomicU64::new(0));
    let done = Arc::new(Notify::new());

    let counter = received.clone();
    let notify = done.clone();
    let sub = conn
        .subscribe(
            subject.clone(),
            Arc::new(handler_fn(move |delivery| {
                let counter = counter.clone();
                let notify = notify.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    let body = delivery
                        .message
                        .data()
                        .map(|d| String::from_utf8_lossy(d).into_owned())
                        .unwrap_or_else(|| "<no payload>".to_string());
                    println!("[{n}] {}: {body}", delivery.message.subject());
                    if max.is_some_and(|m| n >= m) {
                        notify.notify_one();
                    }
                }
            })),
        )
        .await?;

    info!(subject = %subject, "listening, press Ctrl-C to stop");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
        _ = done.notified(), if max.is_some() => {
            info!(count = received.load(Ordering::SeqCst), "message limit reached");
        }
    }

    sub.unsubscribe().await
}

async fn request(
    conn: &Connection,
    subject: String,
    payload: String,
    timeout_ms: u64,
) -> Result<(), courier::Error> {
    let reply = conn
        .request_with_timeout(&subject, payload, Duration::from_millis(timeout_ms))
        .await?;
    match reply.data() {
        Some(data) => println!("{}", String::from_utf8_lossy(data)),
        None => println!("<no payload>"),
    }
    Ok(())
}

async fn reply(
    conn: &Connection,
    subject: String,
    response: String,
) -> Result<(), courier::Error> {
    let sub = conn
        .subscribe(
            subject.clone(),
            Arc::new(handler_fn(move |delivery: courier::Delivery| {
                let response = response.clone();
                async move {
                    if let Err(e) = delivery.respond(response.into_bytes()).await {
                        error!("failed to respond: {e}");
                    }
                }
            })),
        )
        .await?;

    info!(subject = %subject, "responding to requests, press Ctrl-C to stop");
    signal::ctrl_c()
        .await
        .map_err(|e| courier::Error::new(courier::Status::Failure, e.to_string()))?;

    let stats = conn.statistics().snapshot();
    info!(
        served = sub.delivered(),
        messages_out = stats.messages_out,
        "responder stopped"
    );
    sub.unsubscribe().await
}
