//! Booking slot aggregate.
//!
//! Owns one timeslot's lifecycle: participants declare and withdraw
//! availability, and a booking is confirmed only when the student, the
//! aircraft and the instructor are all simultaneously available. A
//! confirmed booking is recorded as exactly three `ParticipantBooked`
//! events — one per role — persisted as a single atomic batch, so a
//! booking either reserves all three participants or none of them.
//! Cancellation mirrors that with three `ParticipantCanceled` events.
//!
//! Duplicate commands are no-op successes: re-marking an available
//! participant, re-booking an existing booking id and canceling an
//! unknown booking all emit zero events.

use crate::types::{BookingId, Participant, ParticipantId, ParticipantType, SlotId, Timeslot};
use airslot_core::aggregate::{Aggregate, Events};
use airslot_core::event::Event;
use airslot_core::smallvec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands accepted by a booking slot.
#[derive(Clone, Debug)]
pub enum SlotCommand {
    /// Declare a participant available for this slot.
    MarkAvailable {
        /// Target slot.
        slot_id: SlotId,
        /// The participant declaring availability.
        participant: Participant,
    },

    /// Withdraw a participant's availability.
    UnmarkAvailable {
        /// Target slot.
        slot_id: SlotId,
        /// The participant withdrawing.
        participant: Participant,
    },

    /// Confirm a booking of one student, one aircraft and one
    /// instructor.
    BookReservation {
        /// Target slot.
        slot_id: SlotId,
        /// The student to book.
        student_id: ParticipantId,
        /// The aircraft to book.
        aircraft_id: ParticipantId,
        /// The instructor to book.
        instructor_id: ParticipantId,
        /// Caller-supplied booking id, unique per slot.
        booking_id: BookingId,
    },

    /// Cancel an existing booking.
    CancelBooking {
        /// Target slot.
        slot_id: SlotId,
        /// The booking to cancel.
        booking_id: BookingId,
    },
}

/// Events recorded by a booking slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotEvent {
    /// A participant was marked available.
    ParticipantMarkedAvailable {
        /// Slot the participant is available for.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
    },

    /// A participant's availability was withdrawn.
    ParticipantUnmarkedAvailable {
        /// Slot the participant withdrew from.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
    },

    /// A participant became part of a confirmed booking.
    ParticipantBooked {
        /// Slot the booking belongs to.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
        /// The booking this participant belongs to.
        booking_id: BookingId,
    },

    /// A participant's booking was canceled.
    ParticipantCanceled {
        /// Slot the booking belonged to.
        slot_id: SlotId,
        /// Participant identifier.
        participant_id: ParticipantId,
        /// Participant role.
        participant_type: ParticipantType,
        /// The canceled booking.
        booking_id: BookingId,
    },
}

impl Event for SlotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::ParticipantMarkedAvailable { .. } => "ParticipantMarkedAvailable.v1",
            Self::ParticipantUnmarkedAvailable { .. } => "ParticipantUnmarkedAvailable.v1",
            Self::ParticipantBooked { .. } => "ParticipantBooked.v1",
            Self::ParticipantCanceled { .. } => "ParticipantCanceled.v1",
        }
    }
}

impl SlotEvent {
    /// The slot this event belongs to.
    #[must_use]
    pub const fn slot_id(&self) -> &SlotId {
        match self {
            Self::ParticipantMarkedAvailable { slot_id, .. }
            | Self::ParticipantUnmarkedAvailable { slot_id, .. }
            | Self::ParticipantBooked { slot_id, .. }
            | Self::ParticipantCanceled { slot_id, .. } => slot_id,
        }
    }

    /// The participant this event is about.
    #[must_use]
    pub const fn participant_id(&self) -> &ParticipantId {
        match self {
            Self::ParticipantMarkedAvailable { participant_id, .. }
            | Self::ParticipantUnmarkedAvailable { participant_id, .. }
            | Self::ParticipantBooked { participant_id, .. }
            | Self::ParticipantCanceled { participant_id, .. } => participant_id,
        }
    }
}

/// Rejections produced by the slot aggregate. Nothing is persisted for a
/// rejected command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Not all three participants are currently available.
    #[error("slot {0} is not bookable")]
    NotBookable(SlotId),
}

/// The booking slot aggregate (see module docs).
pub struct SlotAggregate;

impl Aggregate for SlotAggregate {
    type State = Timeslot;
    type Command = SlotCommand;
    type Event = SlotEvent;
    type Error = SlotError;

    fn handle(state: &Timeslot, command: SlotCommand) -> Result<Events<SlotEvent>, SlotError> {
        match command {
            SlotCommand::MarkAvailable {
                slot_id,
                participant,
            } => {
                if participant.id.is_blank() {
                    return Err(SlotError::Validation("participantId is required".into()));
                }
                if state.is_available(&participant.id, participant.participant_type) {
                    // Already available: success, nothing to record.
                    return Ok(Events::new());
                }
                Ok(smallvec![SlotEvent::ParticipantMarkedAvailable {
                    slot_id,
                    participant_id: participant.id,
                    participant_type: participant.participant_type,
                }])
            }

            SlotCommand::UnmarkAvailable {
                slot_id,
                participant,
            } => {
                if participant.id.is_blank() {
                    return Err(SlotError::Validation("participantId is required".into()));
                }
                if !state.is_available(&participant.id, participant.participant_type) {
                    // Not available: success, nothing to record.
                    return Ok(Events::new());
                }
                Ok(smallvec![SlotEvent::ParticipantUnmarkedAvailable {
                    slot_id,
                    participant_id: participant.id,
                    participant_type: participant.participant_type,
                }])
            }

            SlotCommand::BookReservation {
                slot_id,
                student_id,
                aircraft_id,
                instructor_id,
                booking_id,
            } => {
                if booking_id.is_blank() {
                    return Err(SlotError::Validation("bookingId is required".into()));
                }
                if state.find_booking(&booking_id).is_some() {
                    // Idempotent create: this booking already exists.
                    return Ok(Events::new());
                }
                if !state.is_bookable(&student_id, &aircraft_id, &instructor_id) {
                    return Err(SlotError::NotBookable(slot_id));
                }

                // One event per role, persisted as a single atomic batch:
                // all three participants are booked or none is.
                Ok(smallvec![
                    SlotEvent::ParticipantBooked {
                        slot_id: slot_id.clone(),
                        participant_id: student_id,
                        participant_type: ParticipantType::Student,
                        booking_id: booking_id.clone(),
                    },
                    SlotEvent::ParticipantBooked {
                        slot_id: slot_id.clone(),
                        participant_id: aircraft_id,
                        participant_type: ParticipantType::Aircraft,
                        booking_id: booking_id.clone(),
                    },
                    SlotEvent::ParticipantBooked {
                        slot_id,
                        participant_id: instructor_id,
                        participant_type: ParticipantType::Instructor,
                        booking_id,
                    },
                ])
            }

            SlotCommand::CancelBooking {
                slot_id,
                booking_id,
            } => {
                if booking_id.is_blank() {
                    return Err(SlotError::Validation("bookingId is required".into()));
                }
                let Some(booking) = state.find_booking(&booking_id) else {
                    // Unknown booking: assume already canceled.
                    return Ok(Events::new());
                };

                Ok(booking
                    .participants()
                    .map(|participant| SlotEvent::ParticipantCanceled {
                        slot_id: slot_id.clone(),
                        participant_id: participant.id.clone(),
                        participant_type: participant.participant_type,
                        booking_id: booking_id.clone(),
                    })
                    .collect())
            }
        }
    }

    fn apply(state: &mut Timeslot, event: &SlotEvent) {
        match event {
            SlotEvent::ParticipantMarkedAvailable {
                participant_id,
                participant_type,
                ..
            } => {
                state.reserve(Participant::new(participant_id.clone(), *participant_type));
            }
            SlotEvent::ParticipantUnmarkedAvailable {
                participant_id,
                participant_type,
                ..
            } => {
                state.unreserve(participant_id, *participant_type);
            }
            SlotEvent::ParticipantBooked {
                participant_id,
                participant_type,
                booking_id,
                ..
            } => {
                state.book(
                    booking_id,
                    Participant::new(participant_id.clone(), *participant_type),
                );
            }
            SlotEvent::ParticipantCanceled { booking_id, .. } => {
                state.cancel_booking(booking_id);
            }
        }
    }
}
