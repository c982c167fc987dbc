//! Broker configuration loaded from TOML
//!
//! Every field is pure pass-through to the wrapped client's connect options;
//! nothing here implements policy. Validation happens at load time so
//! misconfiguration surfaces before any connection attempt.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Status};

/// Top-level broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerConfig {
    /// Server URLs, e.g. `nats://127.0.0.1:4222`.
    pub servers: Vec<String>,
    /// Optional connection name reported to the server.
    #[serde(default)]
    pub name: Option<String>,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthSection,
    /// TLS settings.
    #[serde(default)]
    pub tls: TlsSection,
    /// Connect timeout in milliseconds (default: 5000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Default request timeout in milliseconds (default: 2000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Ping interval in seconds (default: 60).
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Maximum reconnect attempts after an established connection drops.
    /// `None` leaves the client default (unlimited).
    #[serde(default)]
    pub max_reconnects: Option<usize>,
    /// Inbound buffer capacity per subscription (default: 1024).
    #[serde(default = "default_subscription_capacity")]
    pub subscription_capacity: usize,
    /// Keep retrying the initial connect instead of failing fast.
    #[serde(default)]
    pub retry_on_initial_connect: bool,
}

/// Authentication mode selection. Required fields per mode are checked by
/// [`BrokerConfig::validate`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    None,
    UserPassword,
    Token,
    Nkey,
    CredsFile,
}

/// Authentication section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AuthSection {
    #[serde(default)]
    pub mode: AuthMode,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    /// Path to an NKey seed file (mode = "nkey").
    pub nkey_seed_path: Option<PathBuf>,
    /// Path to a credentials file holding JWT + seed (mode = "creds_file").
    pub creds_file_path: Option<PathBuf>,
}

/// TLS section. A CA path alone enables server verification; cert + key add
/// client certificate auth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TlsSection {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
    #[serde(default)]
    pub require_tls: bool,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_ping_interval_secs() -> u64 {
    60
}

fn default_subscription_capacity() -> usize {
    1024
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::single_server("nats://127.0.0.1:4222")
    }
}

impl BrokerConfig {
    /// Configuration pointing at a single server with defaults everywhere
    /// else.
    pub fn single_server(url: impl Into<String>) -> Self {
        Self {
            servers: vec![url.into()],
            name: None,
            auth: AuthSection::default(),
            tls: TlsSection::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            max_reconnects: None,
            subscription_capacity: default_subscription_capacity(),
            retry_on_initial_connect: false,
        }
    }

    /// Load and validate configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::new(
                Status::InvalidArg,
                format!("failed to read config file '{}': {e}", path.display()),
            )
        })?;
        let config: BrokerConfig = toml::from_str(&content)
            .map_err(|e| Error::new(Status::InvalidArg, format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check server URLs and auth-mode completeness.
    pub fn validate(&self) -> Result<(), Error> {
        if self.servers.is_empty() {
            return Err(Error::invalid_arg("at least one server URL is required"));
        }
        for server in &self.servers {
            let url = Url::parse(server)
                .map_err(|e| Error::invalid_arg(format!("invalid server URL '{server}': {e}")))?;
            if !matches!(url.scheme(), "nats" | "tls") {
                return Err(Error::invalid_arg(format!(
                    "server URL '{server}' must use the nats:// or tls:// scheme"
                )));
            }
        }
        match self.auth.mode {
            AuthMode::None => {}
            AuthMode::UserPassword => {
                if self.auth.username.is_none() || self.auth.password.is_none() {
                    return Err(Error::invalid_arg(
                        "user_password auth requires 'username' and 'password'",
                    ));
                }
            }
            AuthMode::Token => {
                if self.auth.token.is_none() {
                    return Err(Error::invalid_arg("token auth requires 'token'"));
                }
            }
            AuthMode::Nkey => {
                if self.auth.nkey_seed_path.is_none() {
                    return Err(Error::invalid_arg("nkey auth requires 'nkey_seed_path'"));
                }
            }
            AuthMode::CredsFile => {
                if self.auth.creds_file_path.is_none() {
                    return Err(Error::invalid_arg(
                        "creds_file auth requires 'creds_file_path'",
                    ));
                }
            }
        }
        if self.tls.cert_path.is_some() != self.tls.key_path.is_some() {
            return Err(Error::invalid_arg(
                "tls client auth requires both 'cert_path' and 'key_path'",
            ));
        }
        Ok(())
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Default request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Ping interval as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}
