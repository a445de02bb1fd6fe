//! # Airslot Core
//!
//! Core traits and types for the airslot flight-training scheduler.
//!
//! This crate provides the event-sourcing abstractions the rest of the
//! workspace builds on:
//!
//! - **Event**: immutable facts, bincode-serialized ([`event`])
//! - **Event store**: append-only per-stream log with optimistic
//!   concurrency ([`event_store`])
//! - **Event bus**: at-least-once publish/subscribe ([`event_bus`])
//! - **Aggregate**: pure `handle` (decide) / `apply` (fold) state
//!   machines ([`aggregate`])
//! - **Environment**: injected dependencies behind traits
//!   ([`environment`])
//!
//! ## Architecture principles
//!
//! - State is a fold over events; only events are persisted
//! - Validation happens before an event is created, never during replay
//! - Commands for one stream are serialized; different streams run
//!   concurrently
//! - Derived read models are eventually consistent and rebuildable

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod event;
pub mod event_bus;
pub mod event_store;
pub mod stream;

/// Aggregate module - pure command/event state machines.
///
/// An aggregate owns one entity's lifecycle: it validates commands
/// against current state and turns them into events (`handle`), and it
/// folds events back into state (`apply`). `handle` never mutates and
/// `apply` never fails — all rejection happens before an event exists,
/// so replay is total.
pub mod aggregate {
    use crate::event::Event;
    use serde::{Serialize, de::DeserializeOwned};
    use smallvec::SmallVec;

    /// Batch of events produced by one command.
    ///
    /// Inline capacity of four: the largest batch in this system is the
    /// three per-participant events of a booking.
    pub type Events<E> = SmallVec<[E; 4]>;

    /// A pure, event-sourced state machine.
    ///
    /// # Contract
    ///
    /// - `handle` is a pure function of `(state, command)`. It either
    ///   rejects the command (no events, an error) or returns the events
    ///   that record its effect. A command whose effect is already
    ///   reflected in the state returns an **empty** batch: success, no
    ///   new facts (idempotency).
    /// - `apply` is total and infallible. It must accept any event the
    ///   aggregate ever produced, in order, starting from
    ///   `State::default()`.
    /// - `replay(handle(s, c))` after `replay(history)` must equal the
    ///   live state: state is fully determined by the event history.
    pub trait Aggregate: Send + Sync + 'static {
        /// The state this aggregate folds its events into.
        type State: Clone + Default + Send + Sync;

        /// The commands this aggregate accepts.
        type Command: Send + std::fmt::Debug;

        /// The events this aggregate emits.
        type Event: Event + Clone + std::fmt::Debug + Serialize + DeserializeOwned;

        /// Rejections produced by `handle`.
        type Error: std::error::Error + Send + Sync + 'static;

        /// Decide: validate a command against current state and produce
        /// the events that record its effect.
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the command is rejected; no events
        /// are produced and no state changes.
        fn handle(
            state: &Self::State,
            command: Self::Command,
        ) -> Result<Events<Self::Event>, Self::Error>;

        /// Fold: apply one event to the state.
        fn apply(state: &mut Self::State, event: &Self::Event);

        /// Reconstruct state by folding a full event history from the
        /// empty state.
        fn replay<'a>(events: impl IntoIterator<Item = &'a Self::Event>) -> Self::State {
            let mut state = Self::State::default();
            for event in events {
                Self::apply(&mut state, event);
            }
            state
        }
    }
}

/// Environment module - dependency injection traits.
///
/// External capabilities are abstracted behind traits and injected, so
/// production wires real implementations and tests wire deterministic
/// ones.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time for testability.
    pub trait Clock: Send + Sync {
        /// The current time.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
