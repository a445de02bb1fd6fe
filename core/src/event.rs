//! Event trait and wire format for event sourcing.
//!
//! Events are immutable facts about things that have happened. They are
//! the source of truth: aggregate state is a fold over its event stream.
//! Events are serialized with `bincode` — compact, fast, and uniform
//! across all-Rust services — with optional JSON metadata on the side.

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event serialization.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize an event to bytes.
    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    /// Failed to deserialize an event from bytes.
    #[error("Failed to deserialize event: {0}")]
    Deserialization(String),
}

/// An event that can be persisted to an event store and replayed to
/// reconstruct state.
///
/// `event_type()` must return a stable identifier with a version suffix
/// (e.g. `"ParticipantBooked.v1"`) so schemas can evolve without breaking
/// stored history.
pub trait Event: Send + Sync + 'static {
    /// Stable type identifier for this event, used for storage and routing.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Serialization`] if encoding fails.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::Serialization(e.to_string()))
    }

    /// Deserialize an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Deserialization`] if the bytes are corrupt or
    /// encode a different type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::Deserialization(e.to_string()))
    }
}

/// A serialized event ready for storage or transport.
///
/// The wire format between the application, the event store, and the
/// event bus: the stable type name plus the bincode payload, with
/// optional JSON metadata (correlation ids and the like).
#[derive(Clone, Debug)]
pub struct SerializedEvent {
    /// The event type identifier (e.g. `"ParticipantBooked.v1"`).
    pub event_type: String,

    /// The bincode-serialized event data.
    pub data: Vec<u8>,

    /// Optional metadata as a JSON value.
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Serialize an [`Event`] into the wire format.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Serialization`] if encoding fails.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    enum TestEvent {
        Created { id: String, value: i32 },
    }

    impl Event for TestEvent {
        fn event_type(&self) -> &'static str {
            "TestEvent.Created.v1"
        }
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if serialization fails
    fn serialization_roundtrip() {
        let event = TestEvent::Created {
            id: "test-1".to_string(),
            value: 42,
        };

        let bytes = event.to_bytes().expect("serialization should succeed");
        let back = TestEvent::from_bytes(&bytes).expect("deserialization should succeed");
        assert_eq!(event, back);
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if serialization fails
    fn from_event_carries_type_and_metadata() {
        let event = TestEvent::Created {
            id: "test-1".to_string(),
            value: 7,
        };
        let metadata = serde_json::json!({ "correlation_id": "corr-1" });

        let serialized = SerializedEvent::from_event(&event, Some(metadata.clone()))
            .expect("serialization should succeed");

        assert_eq!(serialized.event_type, "TestEvent.Created.v1");
        assert!(!serialized.data.is_empty());
        assert_eq!(serialized.metadata, Some(metadata));
    }
}
