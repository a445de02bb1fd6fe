//! Flight-training slot scheduler.
//!
//! An event-sourced scheduling service for flight-training timeslots.
//! Each slot needs three distinct participants — a student, an aircraft
//! and an instructor — simultaneously available before a booking can be
//! confirmed; a confirmed booking reserves all three atomically or none.
//!
//! # Architecture
//!
//! ```text
//! Write side (source of truth):
//! ┌───────────────────┐   booking-slot-events   ┌────────────────────────┐
//! │   Booking Slot    │────────────────────────>│  Slot-to-Participant   │
//! │    Aggregate      │                         │      Propagator        │
//! └───────────────────┘                         └───────────┬────────────┘
//!                                                           │ idempotent commands,
//!                                                           │ keyed {slot}-{participant}
//!                                                           ▼
//!                                               ┌────────────────────────┐
//!                                               │   Participant-Slot     │
//!                                               │      Aggregate         │
//!                                               └───────────┬────────────┘
//!                                                           │ participant-slot-events
//! Read side (derived, eventually consistent):               ▼
//!                                               ┌────────────────────────┐
//!                                               │ Participant-Slots View │
//!                                               │  (rows by participant) │
//!                                               └────────────────────────┘
//! ```
//!
//! Commands against one slot are serialized by the entity store, which
//! is what prevents two concurrent bookings from both observing the
//! slot as bookable. Propagation is asynchronous and at-least-once;
//! every downstream handler is idempotent, so each event is applied
//! exactly once in effect. The view lags commands and can be rebuilt
//! from the participant-slot event history.

pub mod aggregates;
pub mod app;
pub mod conditions;
pub mod config;
pub mod propagator;
pub mod types;
pub mod view;

pub use aggregates::{
    ParticipantSlot, ParticipantSlotAggregate, ParticipantSlotCommand, ParticipantSlotEvent,
    SlotAggregate, SlotCommand, SlotError, SlotEvent,
};
pub use app::{SchedulerApp, SchedulerError};
pub use conditions::{ConditionsCheck, ConditionsError, ConditionsReport, ForecastConditions};
pub use config::Config;
pub use propagator::SlotEventPropagator;
pub use types::{
    Booking, BookingId, Participant, ParticipantId, ParticipantStatus, ParticipantType, SlotId,
    Timeslot, participant_slot_key, slot_key_for,
};
pub use view::{ParticipantSlotsView, SlotRow};
