//! Application wiring and service facade.
//!
//! [`SchedulerApp`] assembles the whole pipeline — both entity stores
//! over a shared event store and event bus, the slot-to-participant
//! propagator, the materialized view — and exposes the command and query
//! surface the (out-of-scope) transport layer would call.
//!
//! Commands are acknowledged as soon as the slot aggregate has persisted
//! its events; propagation to the participant records and the view runs
//! asynchronously, so view queries are eventually consistent.

use crate::aggregates::{
    ParticipantSlotAggregate, SlotAggregate, SlotCommand, SlotError,
};
use crate::conditions::ConditionsCheck;
use crate::config::Config;
use crate::propagator::SlotEventPropagator;
use crate::types::{
    BookingId, Participant, ParticipantId, SlotId, Timeslot, slot_key_for,
};
use crate::view::{ParticipantSlotsView, SlotRow};
use airslot_core::environment::Clock;
use airslot_runtime::memory::{MemoryEventBus, MemoryEventStore};
use airslot_runtime::{EntityStore, EntityStoreError, EventConsumer};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Stream category of the booking slot aggregate.
pub const BOOKING_SLOT_CATEGORY: &str = "booking-slot";
/// Topic carrying booking slot events.
pub const BOOKING_SLOT_TOPIC: &str = "booking-slot-events";
/// Stream category of the participant-slot aggregate.
pub const PARTICIPANT_SLOT_CATEGORY: &str = "participant-slot";
/// Topic carrying participant-slot events.
pub const PARTICIPANT_SLOT_TOPIC: &str = "participant-slot-events";

/// Errors reported synchronously to command callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Not all three participants are currently available.
    #[error("slot {0} is not bookable")]
    NotBookable(SlotId),

    /// Flight conditions do not permit booking this slot.
    #[error("flight conditions do not meet requirements for slot {0}")]
    ConditionsNotMet(SlotId),

    /// Storage or transport failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

fn map_slot_error(error: EntityStoreError<SlotError>) -> SchedulerError {
    match error {
        EntityStoreError::Rejected(SlotError::Validation(message)) => {
            SchedulerError::Validation(message)
        }
        EntityStoreError::Rejected(SlotError::NotBookable(slot_id)) => {
            SchedulerError::NotBookable(slot_id)
        }
        other => SchedulerError::Infrastructure(other.to_string()),
    }
}

fn require(id: &str, field: &str) -> Result<(), SchedulerError> {
    if id.trim().is_empty() {
        return Err(SchedulerError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// The assembled scheduling service.
pub struct SchedulerApp {
    slots: Arc<EntityStore<SlotAggregate>>,
    view: Arc<ParticipantSlotsView>,
    conditions: Arc<dyn ConditionsCheck>,
    clock: Arc<dyn Clock>,
    shutdown: broadcast::Sender<()>,
    consumers: Vec<JoinHandle<()>>,
    shutdown_timeout: std::time::Duration,
}

impl SchedulerApp {
    /// Start the service: wire stores, spawn the propagator and view
    /// consumers, and wait until both are subscribed.
    pub async fn start(
        config: &Config,
        clock: Arc<dyn Clock>,
        conditions: Arc<dyn ConditionsCheck>,
    ) -> Self {
        let event_store = Arc::new(MemoryEventStore::new());
        let event_bus = Arc::new(MemoryEventBus::with_capacity(config.bus_capacity));

        let slots = Arc::new(EntityStore::<SlotAggregate>::new(
            BOOKING_SLOT_CATEGORY,
            BOOKING_SLOT_TOPIC,
            event_store.clone(),
            event_bus.clone(),
        ));
        let participant_slots = Arc::new(EntityStore::<ParticipantSlotAggregate>::new(
            PARTICIPANT_SLOT_CATEGORY,
            PARTICIPANT_SLOT_TOPIC,
            event_store,
            event_bus.clone(),
        ));
        let view = Arc::new(ParticipantSlotsView::new());

        let (shutdown, _) = broadcast::channel(8);
        let retry = config.consumer_retry();

        let (propagator_ready, propagator_up) = oneshot::channel();
        let propagator = EventConsumer::new(
            "slot-propagator",
            vec![BOOKING_SLOT_TOPIC.to_string()],
            event_bus.clone(),
            Arc::new(SlotEventPropagator::new(participant_slots)),
            shutdown.subscribe(),
        )
        .with_retry_policy(retry.clone())
        .with_ready_signal(propagator_ready)
        .spawn();

        let (view_ready, view_up) = oneshot::channel();
        let view_consumer = EventConsumer::new(
            "participant-slots-view",
            vec![PARTICIPANT_SLOT_TOPIC.to_string()],
            event_bus,
            view.clone(),
            shutdown.subscribe(),
        )
        .with_retry_policy(retry)
        .with_ready_signal(view_ready)
        .spawn();

        // Events published before a consumer subscribes would never
        // reach it; hold the service back until both are listening.
        let _ = propagator_up.await;
        let _ = view_up.await;
        info!("scheduler started");

        Self {
            slots,
            view,
            conditions,
            clock,
            shutdown,
            consumers: vec![propagator, view_consumer],
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Declare a participant available for a slot. Idempotent.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Validation`] for a blank participant id.
    pub async fn mark_available(
        &self,
        slot_id: SlotId,
        participant: Participant,
    ) -> Result<(), SchedulerError> {
        info!(slot = %slot_id, %participant, "marking available");
        self.slots
            .execute(
                slot_id.as_str(),
                SlotCommand::MarkAvailable {
                    slot_id: slot_id.clone(),
                    participant,
                },
            )
            .await
            .map(drop)
            .map_err(map_slot_error)
    }

    /// Withdraw a participant's availability. Idempotent: unmarking a
    /// participant that is not available succeeds with no effect.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Validation`] for a blank participant id.
    pub async fn unmark_available(
        &self,
        slot_id: SlotId,
        participant: Participant,
    ) -> Result<(), SchedulerError> {
        info!(slot = %slot_id, %participant, "unmarking available");
        self.slots
            .execute(
                slot_id.as_str(),
                SlotCommand::UnmarkAvailable {
                    slot_id: slot_id.clone(),
                    participant,
                },
            )
            .await
            .map(drop)
            .map_err(map_slot_error)
    }

    /// Book a slot for one student, one aircraft and one instructor.
    ///
    /// The slot must lie in the future and the conditions check must
    /// pass before the booking command is issued; a failed or negative
    /// conditions report means "do not book".
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::Validation`] for blank fields or a
    ///   non-future slot
    /// - [`SchedulerError::ConditionsNotMet`] when conditions forbid
    ///   booking
    /// - [`SchedulerError::NotBookable`] when not all three participants
    ///   are available
    pub async fn book_reservation(
        &self,
        slot_id: SlotId,
        student_id: ParticipantId,
        aircraft_id: ParticipantId,
        instructor_id: ParticipantId,
        booking_id: BookingId,
    ) -> Result<(), SchedulerError> {
        require(booking_id.as_str(), "bookingId")?;
        require(student_id.as_str(), "studentId")?;
        require(aircraft_id.as_str(), "aircraftId")?;
        require(instructor_id.as_str(), "instructorId")?;

        let now_key = slot_key_for(self.clock.now());
        if slot_id.as_str() <= now_key.as_str() {
            return Err(SchedulerError::Validation(
                "cannot book a slot in the past or present; the slot must be in the future"
                    .to_string(),
            ));
        }

        match self.conditions.check(&slot_id).await {
            Ok(report) if report.meets_requirements => {
                info!(slot = %slot_id, "flight conditions approved, proceeding with booking");
            }
            Ok(_) => {
                warn!(slot = %slot_id, "booking rejected due to flight conditions");
                return Err(SchedulerError::ConditionsNotMet(slot_id));
            }
            Err(error) => {
                warn!(slot = %slot_id, %error, "conditions check failed, not booking");
                return Err(SchedulerError::ConditionsNotMet(slot_id));
            }
        }

        info!(slot = %slot_id, booking = %booking_id, "booking slot");
        self.slots
            .execute(
                slot_id.as_str(),
                SlotCommand::BookReservation {
                    slot_id: slot_id.clone(),
                    student_id,
                    aircraft_id,
                    instructor_id,
                    booking_id,
                },
            )
            .await
            .map(drop)
            .map_err(map_slot_error)
    }

    /// Cancel a booking. Canceling an unknown booking succeeds — it is
    /// treated as already canceled.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Validation`] for a blank booking id.
    pub async fn cancel_booking(
        &self,
        slot_id: SlotId,
        booking_id: BookingId,
    ) -> Result<(), SchedulerError> {
        info!(slot = %slot_id, booking = %booking_id, "canceling booking");
        self.slots
            .execute(
                slot_id.as_str(),
                SlotCommand::CancelBooking {
                    slot_id: slot_id.clone(),
                    booking_id,
                },
            )
            .await
            .map(drop)
            .map_err(map_slot_error)
    }

    /// The authoritative state of a slot. Unknown slots read as the
    /// empty state.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Infrastructure`] on storage failure.
    pub async fn get_slot(&self, slot_id: &SlotId) -> Result<Timeslot, SchedulerError> {
        self.slots
            .load(slot_id.as_str())
            .await
            .map_err(map_slot_error)
    }

    /// All view rows for a participant. Eventually consistent.
    #[must_use]
    pub fn slots_by_participant(&self, participant_id: &ParticipantId) -> Vec<SlotRow> {
        self.view.by_participant(participant_id)
    }

    /// View rows for a participant filtered by status
    /// (case-insensitive). Eventually consistent.
    #[must_use]
    pub fn slots_by_participant_and_status(
        &self,
        participant_id: &ParticipantId,
        status: &str,
    ) -> Vec<SlotRow> {
        self.view.by_participant_and_status(participant_id, status)
    }

    /// Stop consumers and wait for them to finish, up to the configured
    /// shutdown timeout.
    pub async fn shutdown(self) {
        info!("shutting down scheduler");
        let _ = self.shutdown.send(());
        for consumer in self.consumers {
            if tokio::time::timeout(self.shutdown_timeout, consumer)
                .await
                .is_err()
            {
                warn!("consumer did not stop within the shutdown timeout");
            }
        }
    }
}
