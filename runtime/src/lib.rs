//! # Airslot Runtime
//!
//! Runtime for executing event-sourced aggregates: the [`EntityStore`]
//! actor-per-key command executor, the [`consumer::EventConsumer`]
//! subscribe-process-reconnect loop, retry policies, and in-process
//! [`memory`] backends for the event store and event bus.
//!
//! ## Command execution model
//!
//! Each aggregate instance is identified by a stream key. Commands for
//! the same key are fully serialized — one command at a time observes
//! state, decides, and appends — while commands for different keys run
//! concurrently with no shared lock. This per-key serialization is what
//! upholds multi-participant invariants like "a booking reserves all
//! three participants or none": two concurrent bookings over the same
//! slot cannot both observe it bookable.

use airslot_core::aggregate::Aggregate;
use airslot_core::event::{Event, EventError, SerializedEvent};
use airslot_core::event_bus::EventBus;
use airslot_core::event_store::{EventStore, EventStoreError};
use airslot_core::stream::{StreamId, Version};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

pub mod consumer;
pub mod memory;
pub mod retry;

pub use consumer::{EventConsumer, EventHandler, HandlerError};
pub use retry::{RetryPolicy, retry_with_backoff};

/// Errors from executing a command through an [`EntityStore`].
#[derive(Error, Debug)]
pub enum EntityStoreError<E: std::error::Error> {
    /// The aggregate rejected the command; nothing was persisted.
    #[error(transparent)]
    Rejected(E),

    /// The event store failed.
    #[error("event store error: {0}")]
    Store(#[from] EventStoreError),

    /// An event could not be encoded or decoded.
    #[error("event codec error: {0}")]
    Codec(#[from] EventError),
}

/// Actor-per-key command executor for one aggregate family.
///
/// An `EntityStore` owns every instance of one aggregate type. Instances
/// are addressed by key; the store namespaces keys into stream ids as
/// `"{category}-{key}"` (e.g. category `booking-slot`, key
/// `2025-01-01-10`). Per command it:
///
/// 1. acquires the key's lock (commands per key are serialized),
/// 2. loads and folds the stream into current state,
/// 3. asks the aggregate to decide ([`Aggregate::handle`]),
/// 4. appends the resulting batch atomically, with the loaded version as
///    the optimistic-concurrency expectation,
/// 5. publishes each appended event to the family's topic.
///
/// The command is acknowledged (the call returns) without waiting for
/// downstream consumers; propagation is asynchronous.
pub struct EntityStore<A: Aggregate> {
    category: String,
    topic: String,
    event_store: Arc<dyn EventStore>,
    event_bus: Arc<dyn EventBus>,
    publish_retry: RetryPolicy,
    locks: tokio::sync::Mutex<HashMap<StreamId, Arc<tokio::sync::Mutex<()>>>>,
    _aggregate: PhantomData<A>,
}

impl<A: Aggregate> EntityStore<A> {
    /// Create an entity store for one aggregate family.
    ///
    /// `category` namespaces stream keys; `topic` is where appended
    /// events are published (convention: `"{category}-events"`).
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        topic: impl Into<String>,
        event_store: Arc<dyn EventStore>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            category: category.into(),
            topic: topic.into(),
            event_store,
            event_bus,
            publish_retry: RetryPolicy::default(),
            locks: tokio::sync::Mutex::new(HashMap::new()),
            _aggregate: PhantomData,
        }
    }

    /// Set the retry policy for event bus publishes.
    #[must_use]
    pub fn with_publish_retry(mut self, policy: RetryPolicy) -> Self {
        self.publish_retry = policy;
        self
    }

    /// The stream id for an instance key.
    #[must_use]
    pub fn stream_id(&self, key: &str) -> StreamId {
        StreamId::new(format!("{}-{key}", self.category))
    }

    /// The underlying event store (e.g. for rebuild tooling and tests).
    #[must_use]
    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.event_store
    }

    async fn lock_for(&self, stream_id: &StreamId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(stream_id.clone()).or_default().clone()
    }

    async fn fold_stream(
        &self,
        stream_id: &StreamId,
    ) -> Result<(A::State, Version), EntityStoreError<A::Error>> {
        let stored = self
            .event_store
            .load_events(stream_id.clone(), None)
            .await?;
        let version = Version::new(stored.len() as u64);

        let mut state = A::State::default();
        for record in &stored {
            let event = A::Event::from_bytes(&record.data)?;
            A::apply(&mut state, &event);
        }
        Ok((state, version))
    }

    /// Execute one command against the instance identified by `key`,
    /// returning the post-command state.
    ///
    /// A command the aggregate answers with an empty event batch is an
    /// idempotent no-op: the call succeeds and nothing is persisted.
    ///
    /// # Errors
    ///
    /// - [`EntityStoreError::Rejected`] if the aggregate rejects the
    ///   command (nothing persisted)
    /// - [`EntityStoreError::Store`] / [`EntityStoreError::Codec`] on
    ///   infrastructure failure
    pub async fn execute(
        &self,
        key: &str,
        command: A::Command,
    ) -> Result<A::State, EntityStoreError<A::Error>> {
        let stream_id = self.stream_id(key);
        let lock = self.lock_for(&stream_id).await;
        let _guard = lock.lock().await;

        let (mut state, version) = self.fold_stream(&stream_id).await?;

        debug!(stream = %stream_id, ?command, "executing command");
        let events = A::handle(&state, command).map_err(EntityStoreError::Rejected)?;
        if events.is_empty() {
            debug!(stream = %stream_id, "command was a no-op");
            return Ok(state);
        }

        let mut batch = Vec::with_capacity(events.len());
        for event in &events {
            batch.push(SerializedEvent::from_event(event, None)?);
        }

        // The whole batch lands atomically or not at all. Holding the
        // key lock makes the version check a formality, but it stays as
        // a second line of defense.
        self.event_store
            .append_events(stream_id.clone(), Some(version), batch.clone())
            .await?;

        for event in &events {
            A::apply(&mut state, event);
        }

        for record in batch {
            let outcome = retry_with_backoff(&self.publish_retry, || {
                self.event_bus.publish(&self.topic, &record)
            })
            .await;
            if let Err(bus_error) = outcome {
                // The append already succeeded: the event is durable and
                // consumers can catch up from the store by replay.
                error!(
                    stream = %stream_id,
                    topic = %self.topic,
                    error = %bus_error,
                    "failed to publish appended event"
                );
            }
        }

        Ok(state)
    }

    /// Load the current state of the instance identified by `key`.
    ///
    /// An instance with no events yields `A::State::default()` — reads
    /// of unknown keys succeed with the empty state.
    ///
    /// # Errors
    ///
    /// Returns [`EntityStoreError::Store`] / [`EntityStoreError::Codec`]
    /// on infrastructure failure.
    pub async fn load(&self, key: &str) -> Result<A::State, EntityStoreError<A::Error>> {
        let stream_id = self.stream_id(key);
        let (state, _) = self.fold_stream(&stream_id).await?;
        Ok(state)
    }
}
