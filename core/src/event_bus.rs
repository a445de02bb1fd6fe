//! Event bus abstraction for cross-aggregate propagation.
//!
//! Events flow from the event store (source of truth) through the bus to
//! downstream consumers: the slot-to-participant propagator and the
//! materialized view. Delivery is **at-least-once** — consumers may see
//! an event more than once, and after a reconnect may see a suffix of
//! the stream again — so every consumer must be idempotent. Order is
//! preserved per topic within a single subscription.
//!
//! Topics follow the `{aggregate-type}-events` convention, e.g.
//! `booking-slot-events`.

use crate::event::SerializedEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to publish an event to a topic.
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for the failure.
        reason: String,
    },

    /// A subscriber fell behind and missed events.
    ///
    /// The consumer should log this and resynchronize (e.g. rebuild the
    /// projection by replay) rather than assume a gapless stream.
    #[error("Subscriber lagged, {missed} events dropped")]
    Lagged {
        /// Number of events the subscriber missed.
        missed: u64,
    },

    /// Generic transport failure.
    #[error("Event bus error: {0}")]
    Other(String),
}

/// Stream of events yielded by a subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Publish/subscribe transport for serialized events.
///
/// Implementations must be `Send + Sync`; the trait uses explicit
/// `Pin<Box<dyn Future>>` returns so it can be held as `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic with at-least-once semantics.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the transport rejects
    /// the event.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics, receiving a merged event stream.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the subscription
    /// cannot be established.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
