//! Status codes and error types for client operations
//!
//! Every fallible operation in this crate reports exactly one [`Status`]
//! kind. The mapping from the underlying `async-nats` error types lives
//! here so call sites never inspect transport errors themselves.

use thiserror::Error;

/// Per-call result code.
///
/// Exactly one kind describes each completed call: either `Ok` or a single
/// specific failure. Codes are stable so they can be logged and compared
/// across versions; unknown codes decode to [`Status::Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Status {
    /// The call succeeded.
    Ok = 0,
    /// Catch-all failure with no more specific kind.
    Failure = 1,
    /// The server sent something this client could not handle.
    ProtocolError = 2,
    /// Establishing a connection failed (unreachable server, bad address).
    ConnectionFailed = 3,
    /// The connection was closed while the operation was in flight.
    ConnectionClosed = 4,
    /// The operation requires a live connection and none exists.
    NotConnected = 5,
    /// The operation did not complete within its deadline.
    Timeout = 6,
    /// A request was delivered but no subscriber is listening.
    NoResponders = 7,
    /// An argument failed validation before any I/O happened.
    InvalidArg = 8,
    /// A subject failed validation.
    InvalidSubject = 9,
    /// Authentication or authorization with the server failed.
    AuthFailed = 10,
    /// The connection is draining and refuses new work.
    Draining = 11,
    /// The process-wide runtime has not been initialized.
    NotInitialized = 12,
    /// The process-wide runtime was already initialized.
    AlreadyInitialized = 13,
    /// An operation was attempted in a state that forbids it.
    IllegalState = 14,
}

impl Status {
    /// Stable numeric code for this status.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Decode a numeric code. Unknown codes map to [`Status::Failure`].
    pub fn from_code(code: u16) -> Status {
        match code {
            0 => Status::Ok,
            1 => Status::Failure,
            2 => Status::ProtocolError,
            3 => Status::ConnectionFailed,
            4 => Status::ConnectionClosed,
            5 => Status::NotConnected,
            6 => Status::Timeout,
            7 => Status::NoResponders,
            8 => Status::InvalidArg,
            9 => Status::InvalidSubject,
            10 => Status::AuthFailed,
            11 => Status::Draining,
            12 => Status::NotInitialized,
            13 => Status::AlreadyInitialized,
            14 => Status::IllegalState,
            _ => Status::Failure,
        }
    }

    /// True for the success code only.
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// "Raise" access pattern: unit on success, typed error otherwise.
    pub fn check(self) -> Result<(), Error> {
        match self {
            Status::Ok => Ok(()),
            status => Err(Error::from_status(status)),
        }
    }

    /// "To-error-or-value" access pattern: the value on success, the typed
    /// error otherwise. The value is returned exactly as given and never a
    /// partial result.
    pub fn check_with<T>(self, value: T) -> Result<T, Error> {
        self.check().map(|_| value)
    }

    /// Short human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Failure => "failure",
            Status::ProtocolError => "protocol error",
            Status::ConnectionFailed => "connection failed",
            Status::ConnectionClosed => "connection closed",
            Status::NotConnected => "not connected",
            Status::Timeout => "timeout",
            Status::NoResponders => "no responders",
            Status::InvalidArg => "invalid argument",
            Status::InvalidSubject => "invalid subject",
            Status::AuthFailed => "authentication failed",
            Status::Draining => "draining",
            Status::NotInitialized => "not initialized",
            Status::AlreadyInitialized => "already initialized",
            Status::IllegalState => "illegal state",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure value carrying the status kind plus a diagnostic message.
#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct Error {
    status: Status,
    message: String,
}

impl Error {
    /// Build an error from a non-success status and a diagnostic message.
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Build an error from a bare status, using its name as the message.
    pub fn from_status(status: Status) -> Self {
        Self {
            status,
            message: status.as_str().to_string(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        Self::new(Status::InvalidArg, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(Status::Timeout, message)
    }

    /// The status kind this error was constructed from.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Stable numeric code of the status kind.
    pub fn code(&self) -> u16 {
        self.status.code()
    }

    /// Diagnostic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// True if the operation failed because its deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        self.status == Status::Timeout
    }

    /// True if the request was delivered but nobody was listening.
    pub fn is_no_responders(&self) -> bool {
        self.status == Status::NoResponders
    }
}

impl From<async_nats::ConnectError> for Error {
    fn from(err: async_nats::ConnectError) -> Self {
        let status = match err.kind() {
            async_nats::ConnectErrorKind::TimedOut => Status::Timeout,
            async_nats::ConnectErrorKind::Authentication => Status::AuthFailed,
            _ => Status::ConnectionFailed,
        };
        Error::new(status, format!("connect failed: {err}"))
    }
}

impl From<async_nats::client::PublishError> for Error {
    fn from(err: async_nats::client::PublishError) -> Self {
        let status = match err.kind() {
            async_nats::client::PublishErrorKind::MaxPayloadExceeded => Status::InvalidArg,
            _ => Status::ConnectionClosed,
        };
        Error::new(status, format!("publish failed: {err}"))
    }
}

impl From<async_nats::client::RequestError> for Error {
    fn from(err: async_nats::client::RequestError) -> Self {
        let status = match err.kind() {
            async_nats::client::RequestErrorKind::TimedOut => Status::Timeout,
            async_nats::client::RequestErrorKind::NoResponders => Status::NoResponders,
            _ => Status::Failure,
        };
        Error::new(status, format!("request failed: {err}"))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::from_status(Status::Timeout)
    }
}

/// Shorthand result alias for client operations.
pub type ClientResult<T> = Result<T, Error>;
