//! # Airslot Testing
//!
//! Testing utilities for the airslot scheduler:
//!
//! - [`mocks::FixedClock`] — deterministic time
//! - [`AggregateTest`] — Given-When-Then harness for aggregates

use airslot_core::aggregate::Aggregate;
use airslot_core::environment::Clock;
use chrono::{DateTime, Utc};

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests — always returns the same
    /// time.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a fixed clock pinned to `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Default fixed clock for tests (2024-12-01 00:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2024-12-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub use mocks::{FixedClock, test_clock};

/// Type alias for state assertion functions.
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for event assertion functions.
type EventAssertion<E> = Box<dyn FnOnce(&[E])>;

/// Type alias for error assertion functions.
type ErrorAssertion<E> = Box<dyn FnOnce(&E)>;

/// Given-When-Then harness for [`Aggregate`] unit tests.
///
/// The fixture of an event-sourced aggregate is its history: `given`
/// events are folded into a state, the command under test runs against
/// it, and assertions inspect the emitted events, the post-state (after
/// applying the emitted events) or the rejection.
///
/// # Example
///
/// ```ignore
/// AggregateTest::<SlotAggregate>::given(history)
///     .when(SlotCommand::CancelBooking { .. })
///     .then_events(|events| assert_eq!(events.len(), 3))
///     .then_state(|slot| assert!(slot.find_booking(&id).is_none()))
///     .run();
/// ```
pub struct AggregateTest<A: Aggregate> {
    given: Vec<A::Event>,
    command: Option<A::Command>,
    event_assertions: Vec<EventAssertion<A::Event>>,
    state_assertions: Vec<StateAssertion<A::State>>,
    error_assertion: Option<ErrorAssertion<A::Error>>,
}

impl<A: Aggregate> AggregateTest<A> {
    /// Start from a prior event history (Given).
    #[must_use]
    pub fn given(events: impl IntoIterator<Item = A::Event>) -> Self {
        Self {
            given: events.into_iter().collect(),
            command: None,
            event_assertions: Vec::new(),
            state_assertions: Vec::new(),
            error_assertion: None,
        }
    }

    /// Start from an empty history.
    #[must_use]
    pub fn given_no_history() -> Self {
        Self::given(Vec::new())
    }

    /// The command under test (When).
    #[must_use]
    pub fn when(mut self, command: A::Command) -> Self {
        self.command = Some(command);
        self
    }

    /// Assert on the emitted event batch (Then).
    #[must_use]
    pub fn then_events<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[A::Event]) + 'static,
    {
        self.event_assertions.push(Box::new(assertion));
        self
    }

    /// Assert on the state after the emitted events are applied (Then).
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&A::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Assert that the command is rejected (Then).
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&A::Error) + 'static,
    {
        self.error_assertion = Some(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions.
    ///
    /// # Panics
    ///
    /// Panics if no command was set, if the outcome (events vs.
    /// rejection) does not match the registered assertions, or if any
    /// assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = A::replay(self.given.iter());
        let command = self.command.expect("command must be set with when()");

        match A::handle(&state, command) {
            Ok(events) => {
                assert!(
                    self.error_assertion.is_none(),
                    "expected the command to be rejected, but it produced {} event(s)",
                    events.len()
                );
                for assertion in self.event_assertions {
                    assertion(&events);
                }
                for event in &events {
                    A::apply(&mut state, event);
                }
                for assertion in self.state_assertions {
                    assertion(&state);
                }
            }
            Err(error) => {
                let Some(assertion) = self.error_assertion else {
                    panic!("command was rejected unexpectedly: {error}");
                };
                assertion(&error);
            }
        }
    }
}

/// Helper assertions for event batches.
pub mod assertions {
    /// Assert that a command emitted no events (idempotent no-op).
    ///
    /// # Panics
    ///
    /// Panics if the batch is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_events<E: std::fmt::Debug>(events: &[E]) {
        assert!(
            events.is_empty(),
            "expected no events, but found {}: {:?}",
            events.len(),
            events
        );
    }

    /// Assert the number of emitted events.
    ///
    /// # Panics
    ///
    /// Panics if the count differs.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_event_count<E>(events: &[E], expected: usize) {
        assert_eq!(
            events.len(),
            expected,
            "expected {expected} events, but found {}",
            events.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_deterministic() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }
}
