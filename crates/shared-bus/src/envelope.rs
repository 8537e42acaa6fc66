//! # Envelope
//!
//! The transport-level message unit carried by the bus.
//!
//! Headers are kept as an ordered list rather than a map: the bus preserves
//! whatever the producer wrote, including repeated keys, and lookups scan in
//! insertion order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single header entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name, stored exactly as written by the producer.
    pub key: String,
    /// Header value.
    pub value: String,
}

impl Header {
    /// Create a header entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An immutable message unit: headers plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    message_id: Uuid,
    message_type: String,
    headers: Vec<Header>,
    payload: Vec<u8>,
}

impl Envelope {
    /// Create an envelope with no headers and a fresh message id.
    pub fn new(message_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            message_type: message_type.into(),
            headers: Vec::new(),
            payload: payload.into(),
        }
    }

    /// Append a header. Earlier entries with the same key are kept.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(key, value));
        self
    }

    /// Unique id of this message.
    #[must_use]
    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    /// Fully-qualified type name of the payload.
    #[must_use]
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// All headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Value of the first header whose key equals `key` exactly.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.key == key)
            .map(|header| header.value.as_str())
    }

    /// Opaque payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize to JSON for transports that carry bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
