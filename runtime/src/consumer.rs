//! Event bus consumer with reconnection and retried delivery.
//!
//! `EventConsumer` owns the subscribe-process-reconnect loop so handlers
//! only contain domain logic:
//!
//! ```text
//! loop {
//!     subscribe (retry on failure)
//!     for each event:
//!         handle; on error retry the SAME event with backoff
//!     stream ended -> reconnect after delay
//! }
//! ```
//!
//! Delivery from the bus is at-least-once, and this consumer keeps it
//! that way downstream: a failing handler is retried until it
//! acknowledges the event — an event is never skipped. Handlers must
//! therefore be idempotent; they will occasionally see the same event
//! twice. The only way past an unacknowledged event is shutdown.

use crate::retry::RetryPolicy;
use airslot_core::event::SerializedEvent;
use airslot_core::event_bus::EventBus;
use airslot_core::event_bus::EventStream;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Error type returned by event handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes one event from the bus.
///
/// Implementations must be idempotent: the consumer retries failed
/// events and the bus itself may redeliver after reconnects, so the same
/// event can arrive more than once.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one serialized event.
    ///
    /// # Errors
    ///
    /// Returning an error means "not acknowledged": the consumer retries
    /// the same event with backoff.
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError>;
}

/// Generic event bus consumer.
///
/// Runs as a background task (see [`EventConsumer::spawn`]) until a
/// shutdown signal arrives on the broadcast channel.
pub struct EventConsumer {
    name: String,
    topics: Vec<String>,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    shutdown: broadcast::Receiver<()>,
    retry: RetryPolicy,
    reconnect_delay: Duration,
    ready: Option<tokio::sync::oneshot::Sender<()>>,
}

impl EventConsumer {
    /// Create a consumer with the default retry policy and a 5 second
    /// reconnect delay.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<String>,
        event_bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            event_bus,
            handler,
            shutdown,
            retry: RetryPolicy::default(),
            reconnect_delay: Duration::from_secs(5),
            ready: None,
        }
    }

    /// Set the backoff policy used when a handler rejects an event.
    ///
    /// Only the delay schedule is used; delivery retries do not give up.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the delay before re-subscribing after a lost stream.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Signal `ready` once the first subscription is established.
    ///
    /// Lets callers sequence startup: commands published before a
    /// consumer subscribes would not reach it.
    #[must_use]
    pub fn with_ready_signal(mut self, ready: tokio::sync::oneshot::Sender<()>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Spawn the consumer as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, topics = ?self.topics, "event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "event consumer received shutdown signal");
                    break;
                }
                subscribed = self.event_bus.subscribe(&topics) => {
                    match subscribed {
                        Ok(mut stream) => {
                            info!(consumer = %self.name, "subscribed to event bus");
                            if let Some(ready) = self.ready.take() {
                                let _ = ready.send(());
                            }
                            if !self.process_stream(&mut stream).await {
                                break; // shutdown during processing
                            }
                            warn!(
                                consumer = %self.name,
                                "event stream ended, reconnecting in {:?}",
                                self.reconnect_delay
                            );
                            tokio::time::sleep(self.reconnect_delay).await;
                        }
                        Err(error) => {
                            error!(
                                consumer = %self.name,
                                %error,
                                "failed to subscribe, retrying in {:?}",
                                self.reconnect_delay
                            );
                            tokio::time::sleep(self.reconnect_delay).await;
                        }
                    }
                }
            }
        }

        info!(consumer = %self.name, "event consumer stopped");
    }

    /// Process events until the stream ends (returns `true`) or shutdown
    /// is signaled (returns `false`).
    async fn process_stream(&mut self, stream: &mut EventStream) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "shutdown during stream processing");
                    return false;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(event)) => {
                            if !self.deliver(&event).await {
                                return false;
                            }
                        }
                        Some(Err(error)) => {
                            // Lag means events were missed; surface loudly so an
                            // operator can trigger a rebuild of the read model.
                            error!(consumer = %self.name, %error, "event stream error");
                        }
                        None => return true,
                    }
                }
            }
        }
    }

    /// Deliver one event, retrying with backoff until the handler
    /// acknowledges it. Returns `false` if shutdown interrupted delivery.
    async fn deliver(&mut self, event: &SerializedEvent) -> bool {
        let mut attempt = 0usize;
        loop {
            match self.handler.handle(event).await {
                Ok(()) => return true,
                Err(error) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        consumer = %self.name,
                        event_type = %event.event_type,
                        %error,
                        attempt,
                        "handler failed, retrying in {delay:?}"
                    );
                    attempt += 1;
                    tokio::select! {
                        _ = self.shutdown.recv() => return false,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryEventBus;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingHandler {
        /// Number of failures to simulate before acknowledging.
        fail_first: usize,
        attempts: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) < self.fail_first {
                return Err("temporarily unavailable".into());
            }
            self.seen
                .lock()
                .unwrap()
                .push(event.event_type.clone());
            Ok(())
        }
    }

    async fn wait_for(handler: &RecordingHandler, count: usize) {
        for _ in 0..200 {
            if handler.seen.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let seen = handler.seen.lock().unwrap().clone();
        assert!(seen.len() >= count, "saw only {seen:?}");
    }

    #[tokio::test]
    async fn consumes_published_events_in_order() {
        let bus = Arc::new(MemoryEventBus::new());
        let handler = Arc::new(RecordingHandler {
            fail_first: 0,
            attempts: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = EventConsumer::new(
            "test",
            vec!["booking-slot-events".to_string()],
            bus.clone(),
            handler.clone(),
            shutdown_rx,
        )
        .spawn();

        // Give the consumer a beat to subscribe before publishing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        for name in ["A.v1", "B.v1", "C.v1"] {
            bus.publish(
                "booking-slot-events",
                &SerializedEvent::new(name.to_string(), vec![], None),
            )
            .await
            .unwrap();
        }

        wait_for(&handler, 3).await;
        assert_eq!(
            *handler.seen.lock().unwrap(),
            vec!["A.v1", "B.v1", "C.v1"]
        );

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn retries_failed_event_until_acknowledged() {
        let bus = Arc::new(MemoryEventBus::new());
        let handler = Arc::new(RecordingHandler {
            fail_first: 3,
            attempts: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = EventConsumer::new(
            "test",
            vec!["booking-slot-events".to_string()],
            bus.clone(),
            handler.clone(),
            shutdown_rx,
        )
        .with_retry_policy(RetryPolicy::default().with_initial_delay(Duration::from_millis(1)))
        .spawn();

        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.publish(
            "booking-slot-events",
            &SerializedEvent::new("A.v1".to_string(), vec![], None),
        )
        .await
        .unwrap();

        wait_for(&handler, 1).await;
        // 3 failures + 1 success, event delivered exactly once in effect.
        assert_eq!(handler.attempts.load(Ordering::SeqCst), 4);
        assert_eq!(*handler.seen.lock().unwrap(), vec!["A.v1"]);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
