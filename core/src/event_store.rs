//! Event store abstraction: append-only, per-stream, optimistically
//! concurrent.
//!
//! The trait is deliberately minimal — append a batch of events to a
//! stream, load a stream back — which is exactly what event-sourced
//! aggregates need. Appends are atomic per call: either every event in
//! the batch becomes visible or none does. There is no update and no
//! delete; corrections happen by appending compensating events.
//!
//! Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
//! so the trait stays dyn-compatible (`Arc<dyn EventStore>`).

use crate::event::SerializedEvent;
use crate::stream::{StreamId, Version};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event store operations.
#[derive(Error, Debug)]
pub enum EventStoreError {
    /// Optimistic concurrency conflict: the stream moved since the caller
    /// read it.
    #[error("Concurrency conflict on {stream_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The stream where the conflict occurred.
        stream_id: StreamId,
        /// The version the caller expected the stream to be at.
        expected: Version,
        /// The actual current version of the stream.
        actual: Version,
    },

    /// Backend storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Append-only event storage keyed by stream.
///
/// Implementations must be `Send + Sync`. The batch passed to
/// [`EventStore::append_events`] is persisted atomically, and events
/// within a stream keep their append order on load — the two properties
/// aggregate correctness rests on.
pub trait EventStore: Send + Sync {
    /// Append a batch of events to a stream, atomically.
    ///
    /// `expected_version` implements optimistic concurrency: `Some(v)`
    /// asserts the stream currently holds exactly `v` events, `None`
    /// appends unconditionally. Returns the stream's version after the
    /// append.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::ConcurrencyConflict`] if the version check fails
    /// - [`EventStoreError::Storage`] if the backend fails
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>>;

    /// Load a stream's events in append order.
    ///
    /// `from_version` skips events before the given version (inclusive
    /// start); `None` loads from the beginning. A stream that does not
    /// exist yields an empty vector — new streams start empty, that is
    /// not an error.
    ///
    /// # Errors
    ///
    /// - [`EventStoreError::Storage`] if the backend fails
    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>;
}
