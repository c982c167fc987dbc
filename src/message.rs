//! Owned message values with three-way payload semantics
//!
//! A [`Message`] distinguishes a missing payload from an empty one: locally
//! constructed messages start with no payload at all, while anything that
//! came off the wire carries a payload that may be zero-length. Callers must
//! check [`Message::data`] rather than assume bytes are present.

use bytes::Bytes;

use crate::error::{Error, Status};

/// One received or constructed message: subject, optional reply subject,
/// optional byte payload.
///
/// Plain owned value; dropping it is the release. There is no shared
/// ownership, so release happens exactly once by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    subject: String,
    reply: Option<String>,
    payload: Option<Bytes>,
}

impl Message {
    /// Construct a message with no payload set.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            payload: None,
        }
    }

    /// Construct a message carrying a payload (possibly zero-length).
    pub fn with_payload(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            payload: Some(payload.into()),
        }
    }

    /// Set the reply subject, marking this message as a request.
    pub fn reply_to(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// The subject this message was published to. Never absent.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The payload, if one was set.
    ///
    /// `None` means no payload was ever set; `Some` with length zero means an
    /// empty payload was set explicitly. The two are never coerced into each
    /// other.
    pub fn data(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// The reply subject, if any. `None` means this is not a request.
    pub fn reply(&self) -> Option<&str> {
        self.reply.as_deref()
    }

    /// Consume the message, taking the payload buffer.
    pub fn into_payload(self) -> Option<Bytes> {
        self.payload
    }

    /// Payload length in bytes, zero when absent.
    pub fn len(&self) -> usize {
        self.payload.as_ref().map_or(0, |p| p.len())
    }

    /// True when no payload is set or the payload is zero-length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<async_nats::Message> for Message {
    fn from(msg: async_nats::Message) -> Self {
        // Wire messages always carry a payload, possibly empty. Absence only
        // exists for locally constructed messages.
        Self {
            subject: msg.subject.to_string(),
            reply: msg.reply.map(|r| r.to_string()),
            payload: Some(msg.payload),
        }
    }
}

/// Validate a subject before any I/O happens.
///
/// Subjects are dot-separated tokens; every token must be non-empty and free
/// of whitespace. Wildcard tokens (`*`, `>`) are accepted since subscription
/// subjects may carry them.
pub fn validate_subject(subject: &str) -> Result<(), Error> {
    if subject.is_empty() {
        return Err(Error::new(Status::InvalidSubject, "subject is empty"));
    }
    if subject.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::new(
            Status::InvalidSubject,
            format!("subject '{subject}' contains whitespace"),
        ));
    }
    if subject.split('.').any(str::is_empty) {
        return Err(Error::new(
            Status::InvalidSubject,
            format!("subject '{subject}' has an empty token"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_without_payload_yields_absent_data() {
        let msg = Message::new("updates");
        assert_eq!(msg.subject(), "updates");
        assert_eq!(msg.data(), None);
        assert_eq!(msg.reply(), None);
        assert!(msg.is_empty());
    }

    #[test]
    fn test_empty_payload_is_distinct_from_absent() {
        let absent = Message::new("updates");
        let empty = Message::with_payload("updates", Bytes::new());

        assert_eq!(absent.data(), None);
        assert_eq!(empty.data(), Some(&[][..]));
        assert_ne!(absent, empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_payload_round_trip() {
        let msg = Message::with_payload("orders.created", &b"greetings"[..]);
        assert_eq!(msg.data(), Some(&b"greetings"[..]));
        assert_eq!(msg.len(), 9);
        assert_eq!(msg.into_payload().unwrap(), Bytes::from_static(b"greetings"));
    }

    #[test]
    fn test_reply_subject_marks_request() {
        let msg = Message::with_payload("channel", &b"greetings"[..]).reply_to("_INBOX.abc");
        assert_eq!(msg.reply(), Some("_INBOX.abc"));

        let plain = Message::new("channel");
        assert_eq!(plain.reply(), None);
    }

    #[test]
    fn test_wire_message_maps_empty_payload_to_present_empty() {
        let raw = async_nats::Message {
            subject: "updates".into(),
            reply: None,
            payload: Bytes::new(),
            headers: None,
            status: None,
            description: None,
            length: 0,
        };
        let msg = Message::from(raw);
        // Present-empty, never coerced to absent.
        assert_eq!(msg.data(), Some(&[][..]));
    }

    #[test]
    fn test_wire_message_preserves_subject_and_reply() {
        let raw = async_nats::Message {
            subject: "channel".into(),
            reply: Some("_INBOX.xyz".into()),
            payload: Bytes::from_static(b"greetings"),
            headers: None,
            status: None,
            description: None,
            length: 9,
        };
        let msg = Message::from(raw);
        assert_eq!(msg.subject(), "channel");
        assert_eq!(msg.reply(), Some("_INBOX.xyz"));
        assert_eq!(msg.data(), Some(&b"greetings"[..]));
    }

    #[test]
    fn test_validate_subject_accepts_plain_and_wildcards() {
        assert!(validate_subject("orders").is_ok());
        assert!(validate_subject("orders.created.eu").is_ok());
        assert!(validate_subject("orders.*").is_ok());
        assert!(validate_subject("orders.>").is_ok());
    }

    #[test]
    fn test_validate_subject_rejects_bad_input() {
        for bad in ["", "orders created", "orders..created", ".orders", "orders.", "a\tb"] {
            let err = validate_subject(bad).unwrap_err();
            assert_eq!(err.status(), Status::InvalidSubject, "subject: {bad:?}");
        }
    }
}
