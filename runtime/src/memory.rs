//! In-process event store and event bus backends.
//!
//! These implement the [`EventStore`] and [`EventBus`] seams over plain
//! process memory: a per-stream `Vec` stands in for the durable ordered
//! log, and a `tokio::sync::broadcast` channel per topic stands in for
//! the bus. They carry the same contracts the traits document — atomic
//! batch appends, per-stream order, optimistic concurrency,
//! at-least-once fan-out — which is what the aggregates and consumers
//! are written against.

use airslot_core::event::SerializedEvent;
use airslot_core::event_bus::{EventBus, EventBusError, EventStream};
use airslot_core::event_store::{EventStore, EventStoreError};
use airslot_core::stream::{StreamId, Version};
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// In-process [`EventStore`]: per-stream append-only vectors.
#[derive(Default)]
pub struct MemoryEventStore {
    streams: RwLock<HashMap<StreamId, Vec<SerializedEvent>>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        expected_version: Option<Version>,
        events: Vec<SerializedEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, EventStoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut streams = self.streams.write().await;
            let stream = streams.entry(stream_id.clone()).or_default();
            let actual = Version::new(stream.len() as u64);

            if let Some(expected) = expected_version {
                if expected != actual {
                    return Err(EventStoreError::ConcurrencyConflict {
                        stream_id,
                        expected,
                        actual,
                    });
                }
            }

            stream.extend(events);
            Ok(Version::new(stream.len() as u64))
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SerializedEvent>, EventStoreError>> + Send + '_>>
    {
        Box::pin(async move {
            let streams = self.streams.read().await;
            let skip = from_version.map_or(0, |v| v.value() as usize);
            Ok(streams
                .get(&stream_id)
                .map(|events| events.iter().skip(skip).cloned().collect())
                .unwrap_or_default())
        })
    }
}

/// In-process [`EventBus`]: one broadcast channel per topic.
///
/// Publishing to a topic with no live subscribers succeeds and delivers
/// nothing — the event store remains the source of truth, and consumers
/// that come up later rebuild from it. A subscriber that falls more than
/// `capacity` events behind receives [`EventBusError::Lagged`] in its
/// stream instead of the missed events.
pub struct MemoryEventBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<SerializedEvent>>>,
}

impl MemoryEventBus {
    /// Default per-topic channel capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom per-topic capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<SerializedEvent> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for MemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        // A send error only means no receiver is currently subscribed.
        let _ = self.sender(topic).send(event.clone());
        Box::pin(async { Ok(()) })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let streams: Vec<_> = topics
            .iter()
            .map(|topic| {
                BroadcastStream::new(self.sender(topic).subscribe()).map(|item| {
                    item.map_err(|BroadcastStreamRecvError::Lagged(missed)| {
                        EventBusError::Lagged { missed }
                    })
                })
            })
            .collect();

        let stream: EventStream = Box::pin(futures::stream::select_all(streams));
        Box::pin(async move { Ok(stream) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(name: &str) -> SerializedEvent {
        SerializedEvent::new(name.to_string(), vec![1, 2, 3], None)
    }

    #[tokio::test]
    async fn append_and_load_preserve_order() {
        let store = MemoryEventStore::new();
        let stream_id = StreamId::new("booking-slot-2025-01-01-10");

        let v = store
            .append_events(
                stream_id.clone(),
                Some(Version::INITIAL),
                vec![event("A.v1"), event("B.v1")],
            )
            .await
            .unwrap();
        assert_eq!(v, Version::new(2));

        let events = store.load_events(stream_id.clone(), None).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "A.v1");
        assert_eq!(events[1].event_type, "B.v1");

        let tail = store
            .load_events(stream_id, Some(Version::new(1)))
            .await
            .unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].event_type, "B.v1");
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = MemoryEventStore::new();
        let stream_id = StreamId::new("booking-slot-2025-01-01-10");

        store
            .append_events(stream_id.clone(), Some(Version::INITIAL), vec![event("A.v1")])
            .await
            .unwrap();

        let result = store
            .append_events(stream_id, Some(Version::INITIAL), vec![event("B.v1")])
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn missing_stream_loads_empty() {
        let store = MemoryEventStore::new();
        let events = store
            .load_events(StreamId::new("booking-slot-nowhere"), None)
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn bus_delivers_to_subscribers() {
        let bus = MemoryEventBus::new();
        let mut stream = bus.subscribe(&["booking-slot-events"]).await.unwrap();

        bus.publish("booking-slot-events", &event("A.v1"))
            .await
            .unwrap();

        let received = stream.next().await.unwrap().unwrap();
        assert_eq!(received.event_type, "A.v1");
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let bus = MemoryEventBus::new();
        bus.publish("booking-slot-events", &event("A.v1"))
            .await
            .unwrap();
    }
}
