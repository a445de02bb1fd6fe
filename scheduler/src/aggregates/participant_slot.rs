//! Participant-slot aggregate: the derived per-(slot, participant)
//! record.
//!
//! Driven entirely by propagated slot events — no client talks to it
//! directly and no cross-entity validation happens here; the booking
//! slot already validated everything. Each command records the
//! propagated fact and moves the status machine:
//! `available → booked → canceled`, or `available → unavailable`
//! (logical removal; a later mark recreates the record).
//!
//! Delivery from the propagator is at-least-once, so every handler is a
//! pure function of the new fact: a command whose fact is already
//! reflected in the record persists nothing.

use crate::types::{BookingId, ParticipantId, ParticipantStatus, ParticipantType, SlotId};
use airslot_core::aggregate::{Aggregate, Events};
use airslot_core::event::Event;
use airslot_core::smallvec;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// The derived record for one (slot, participant) pair.
///
/// The aggregate state is `Option<ParticipantSlot>`: `None` until the
/// first propagated fact creates the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSlot {
    /// Slot this record belongs to.
    pub slot_id: SlotId,
    /// Participant this record belongs to.
    pub participant_id: ParticipantId,
    /// Participant role.
    pub participant_type: ParticipantType,
    /// Current status of the participant within the slot.
    pub status: ParticipantStatus,
    /// Booking the participant is (or was) part of, for booked/canceled
    /// status.
    pub booking_id: Option<BookingId>,
}

/// Commands issued by the propagator, mirroring the four slot events.
#[derive(Clone, Debug)]
pub enum ParticipantSlotCommand {
    /// The participant was marked available in the slot.
    MarkAvailable {
        /// Slot identifier.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
    },

    /// The participant's availability was withdrawn; the record is
    /// logically removed.
    UnmarkAvailable {
        /// Slot identifier.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
    },

    /// The participant was booked.
    Book {
        /// Slot identifier.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
        /// The booking the participant belongs to.
        booking_id: BookingId,
    },

    /// The participant's booking was canceled.
    Cancel {
        /// Slot identifier.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
        /// The canceled booking.
        booking_id: BookingId,
    },
}

/// Events recorded for one (slot, participant) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantSlotEvent {
    /// The record was (re)created as available.
    MarkedAvailable {
        /// Slot identifier.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
    },

    /// The record was marked unavailable and logically removed.
    UnmarkedAvailable {
        /// Slot identifier.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
    },

    /// The participant was booked.
    Booked {
        /// Slot identifier.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
        /// The booking the participant belongs to.
        booking_id: BookingId,
    },

    /// The participant's booking was canceled.
    Canceled {
        /// Slot identifier.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
        /// The canceled booking.
        booking_id: BookingId,
    },
}

impl Event for ParticipantSlotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::MarkedAvailable { .. } => "MarkedAvailable.v1",
            Self::UnmarkedAvailable { .. } => "UnmarkedAvailable.v1",
            Self::Booked { .. } => "Booked.v1",
            Self::Canceled { .. } => "Canceled.v1",
        }
    }
}

/// The participant-slot aggregate (see module docs).
pub struct ParticipantSlotAggregate;

impl ParticipantSlotAggregate {
    fn status_of(state: &Option<ParticipantSlot>) -> Option<ParticipantStatus> {
        state.as_ref().map(|record| record.status)
    }

    fn reflects(
        state: &Option<ParticipantSlot>,
        status: ParticipantStatus,
        booking_id: &BookingId,
    ) -> bool {
        state.as_ref().is_some_and(|record| {
            record.status == status && record.booking_id.as_ref() == Some(booking_id)
        })
    }
}

impl Aggregate for ParticipantSlotAggregate {
    type State = Option<ParticipantSlot>;
    type Command = ParticipantSlotCommand;
    type Event = ParticipantSlotEvent;
    // Propagated facts are never rejected here; validation already
    // happened at the booking slot.
    type Error = Infallible;

    fn handle(
        state: &Self::State,
        command: ParticipantSlotCommand,
    ) -> Result<Events<ParticipantSlotEvent>, Infallible> {
        let events = match command {
            ParticipantSlotCommand::MarkAvailable {
                slot_id,
                participant_id,
                participant_type,
            } => {
                if Self::status_of(state) == Some(ParticipantStatus::Available) {
                    Events::new()
                } else {
                    smallvec![ParticipantSlotEvent::MarkedAvailable {
                        slot_id,
                        participant_id,
                        participant_type,
                    }]
                }
            }

            ParticipantSlotCommand::UnmarkAvailable {
                slot_id,
                participant_id,
                participant_type,
            } => {
                // Absent or already-removed records stay silent: a
                // redelivered unmark is harmless.
                if matches!(
                    Self::status_of(state),
                    None | Some(ParticipantStatus::Unavailable)
                ) {
                    Events::new()
                } else {
                    smallvec![ParticipantSlotEvent::UnmarkedAvailable {
                        slot_id,
                        participant_id,
                        participant_type,
                    }]
                }
            }

            ParticipantSlotCommand::Book {
                slot_id,
                participant_id,
                participant_type,
                booking_id,
            } => {
                if Self::reflects(state, ParticipantStatus::Booked, &booking_id) {
                    Events::new()
                } else {
                    smallvec![ParticipantSlotEvent::Booked {
                        slot_id,
                        participant_id,
                        participant_type,
                        booking_id,
                    }]
                }
            }

            ParticipantSlotCommand::Cancel {
                slot_id,
                participant_id,
                participant_type,
                booking_id,
            } => {
                if Self::reflects(state, ParticipantStatus::Canceled, &booking_id) {
                    Events::new()
                } else {
                    smallvec![ParticipantSlotEvent::Canceled {
                        slot_id,
                        participant_id,
                        participant_type,
                        booking_id,
                    }]
                }
            }
        };

        Ok(events)
    }

    fn apply(state: &mut Self::State, event: &ParticipantSlotEvent) {
        *state = Some(match event {
            ParticipantSlotEvent::MarkedAvailable {
                slot_id,
                participant_id,
                participant_type,
            } => ParticipantSlot {
                slot_id: slot_id.clone(),
                participant_id: participant_id.clone(),
                participant_type: *participant_type,
                status: ParticipantStatus::Available,
                booking_id: None,
            },
            ParticipantSlotEvent::UnmarkedAvailable {
                slot_id,
                participant_id,
                participant_type,
            } => ParticipantSlot {
                slot_id: slot_id.clone(),
                participant_id: participant_id.clone(),
                participant_type: *participant_type,
                status: ParticipantStatus::Unavailable,
                booking_id: None,
            },
            ParticipantSlotEvent::Booked {
                slot_id,
                participant_id,
                participant_type,
                booking_id,
            } => ParticipantSlot {
                slot_id: slot_id.clone(),
                participant_id: participant_id.clone(),
                participant_type: *participant_type,
                status: ParticipantStatus::Booked,
                booking_id: Some(booking_id.clone()),
            },
            ParticipantSlotEvent::Canceled {
                slot_id,
                participant_id,
                participant_type,
                booking_id,
            } => ParticipantSlot {
                slot_id: slot_id.clone(),
                participant_id: participant_id.clone(),
                participant_type: *participant_type,
                status: ParticipantStatus::Canceled,
                booking_id: Some(booking_id.clone()),
            },
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use airslot_testing::{AggregateTest, assertions};

    fn mark() -> ParticipantSlotCommand {
        ParticipantSlotCommand::MarkAvailable {
            slot_id: SlotId::new("2025-01-01-10"),
            participant_id: ParticipantId::new("s1"),
            participant_type: ParticipantType::Student,
        }
    }

    fn marked() -> ParticipantSlotEvent {
        ParticipantSlotEvent::MarkedAvailable {
            slot_id: SlotId::new("2025-01-01-10"),
            participant_id: ParticipantId::new("s1"),
            participant_type: ParticipantType::Student,
        }
    }

    fn book() -> ParticipantSlotCommand {
        ParticipantSlotCommand::Book {
            slot_id: SlotId::new("2025-01-01-10"),
            participant_id: ParticipantId::new("s1"),
            participant_type: ParticipantType::Student,
            booking_id: BookingId::new("bk-1"),
        }
    }

    fn booked() -> ParticipantSlotEvent {
        ParticipantSlotEvent::Booked {
            slot_id: SlotId::new("2025-01-01-10"),
            participant_id: ParticipantId::new("s1"),
            participant_type: ParticipantType::Student,
            booking_id: BookingId::new("bk-1"),
        }
    }

    #[test]
    fn first_mark_creates_available_record() {
        AggregateTest::<ParticipantSlotAggregate>::given_no_history()
            .when(mark())
            .then_events(|events| assertions::assert_event_count(events, 1))
            .then_state(|state| {
                let record = state.as_ref().unwrap();
                assert_eq!(record.status, ParticipantStatus::Available);
                assert_eq!(record.booking_id, None);
            })
            .run();
    }

    #[test]
    fn redelivered_mark_is_noop() {
        AggregateTest::<ParticipantSlotAggregate>::given([marked()])
            .when(mark())
            .then_events(assertions::assert_no_events)
            .run();
    }

    #[test]
    fn book_sets_status_and_booking() {
        AggregateTest::<ParticipantSlotAggregate>::given([marked()])
            .when(book())
            .then_state(|state| {
                let record = state.as_ref().unwrap();
                assert_eq!(record.status, ParticipantStatus::Booked);
                assert_eq!(record.booking_id, Some(BookingId::new("bk-1")));
            })
            .run();
    }

    #[test]
    fn redelivered_book_is_noop() {
        AggregateTest::<ParticipantSlotAggregate>::given([marked(), booked()])
            .when(book())
            .then_events(assertions::assert_no_events)
            .run();
    }

    #[test]
    fn cancel_transitions_booked_record() {
        AggregateTest::<ParticipantSlotAggregate>::given([marked(), booked()])
            .when(ParticipantSlotCommand::Cancel {
                slot_id: SlotId::new("2025-01-01-10"),
                participant_id: ParticipantId::new("s1"),
                participant_type: ParticipantType::Student,
                booking_id: BookingId::new("bk-1"),
            })
            .then_state(|state| {
                let record = state.as_ref().unwrap();
                assert_eq!(record.status, ParticipantStatus::Canceled);
                assert_eq!(record.booking_id, Some(BookingId::new("bk-1")));
            })
            .run();
    }

    #[test]
    fn unmark_tombstones_and_redelivery_is_noop() {
        AggregateTest::<ParticipantSlotAggregate>::given([marked()])
            .when(ParticipantSlotCommand::UnmarkAvailable {
                slot_id: SlotId::new("2025-01-01-10"),
                participant_id: ParticipantId::new("s1"),
                participant_type: ParticipantType::Student,
            })
            .then_state(|state| {
                assert_eq!(
                    state.as_ref().map(|r| r.status),
                    Some(ParticipantStatus::Unavailable)
                );
            })
            .run();

        AggregateTest::<ParticipantSlotAggregate>::given([
            marked(),
            ParticipantSlotEvent::UnmarkedAvailable {
                slot_id: SlotId::new("2025-01-01-10"),
                participant_id: ParticipantId::new("s1"),
                participant_type: ParticipantType::Student,
            },
        ])
        .when(ParticipantSlotCommand::UnmarkAvailable {
            slot_id: SlotId::new("2025-01-01-10"),
            participant_id: ParticipantId::new("s1"),
            participant_type: ParticipantType::Student,
        })
        .then_events(assertions::assert_no_events)
        .run();
    }

    #[test]
    fn unmark_of_absent_record_is_noop() {
        AggregateTest::<ParticipantSlotAggregate>::given_no_history()
            .when(ParticipantSlotCommand::UnmarkAvailable {
                slot_id: SlotId::new("2025-01-01-10"),
                participant_id: ParticipantId::new("s1"),
                participant_type: ParticipantType::Student,
            })
            .then_events(assertions::assert_no_events)
            .run();
    }

    #[test]
    fn fresh_mark_after_cancel_reopens_availability() {
        // Cancel does not re-mark; only a fresh MarkAvailable does.
        AggregateTest::<ParticipantSlotAggregate>::given([
            marked(),
            booked(),
            ParticipantSlotEvent::Canceled {
                slot_id: SlotId::new("2025-01-01-10"),
                participant_id: ParticipantId::new("s1"),
                participant_type: ParticipantType::Student,
                booking_id: BookingId::new("bk-1"),
            },
        ])
        .when(mark())
        .then_state(|state| {
            let record = state.as_ref().unwrap();
            assert_eq!(record.status, ParticipantStatus::Available);
            assert_eq!(record.booking_id, None);
        })
        .run();
    }
}
