//! Slot-to-participant event propagator.
//!
//! Consumes booking slot events and turns each into a command against
//! the participant-slot entity keyed `"{slotId}-{participantId}"`. The
//! participant type is not part of the routing key because participant
//! ids are unique across types.
//!
//! Delivery is at-least-once: the surrounding [`EventConsumer`] retries
//! an unacknowledged event until this handler succeeds, and the target
//! aggregate absorbs duplicates, so every slot event is applied exactly
//! once in effect even when delivered more than once in fact.
//!
//! [`EventConsumer`]: airslot_runtime::EventConsumer

use crate::aggregates::{ParticipantSlotAggregate, ParticipantSlotCommand, SlotEvent};
use crate::types::participant_slot_key;
use airslot_core::event::{Event, SerializedEvent};
use airslot_runtime::{EntityStore, EventHandler, HandlerError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Handler that propagates booking slot events to participant-slot
/// entities.
pub struct SlotEventPropagator {
    participant_slots: Arc<EntityStore<ParticipantSlotAggregate>>,
}

impl SlotEventPropagator {
    /// Create a propagator targeting the given participant-slot store.
    #[must_use]
    pub fn new(participant_slots: Arc<EntityStore<ParticipantSlotAggregate>>) -> Self {
        Self { participant_slots }
    }
}

#[async_trait]
impl EventHandler for SlotEventPropagator {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let event = SlotEvent::from_bytes(&event.data)?;
        let key = participant_slot_key(event.slot_id(), event.participant_id());

        let command = match event {
            SlotEvent::ParticipantMarkedAvailable {
                slot_id,
                participant_id,
                participant_type,
            } => {
                info!(slot = %slot_id, participant = %participant_id, "propagating marked-available");
                ParticipantSlotCommand::MarkAvailable {
                    slot_id,
                    participant_id,
                    participant_type,
                }
            }
            SlotEvent::ParticipantUnmarkedAvailable {
                slot_id,
                participant_id,
                participant_type,
            } => {
                info!(slot = %slot_id, participant = %participant_id, "propagating unmarked-available");
                ParticipantSlotCommand::UnmarkAvailable {
                    slot_id,
                    participant_id,
                    participant_type,
                }
            }
            SlotEvent::ParticipantBooked {
                slot_id,
                participant_id,
                participant_type,
                booking_id,
            } => {
                info!(
                    slot = %slot_id,
                    participant = %participant_id,
                    booking = %booking_id,
                    "propagating booked status"
                );
                ParticipantSlotCommand::Book {
                    slot_id,
                    participant_id,
                    participant_type,
                    booking_id,
                }
            }
            SlotEvent::ParticipantCanceled {
                slot_id,
                participant_id,
                participant_type,
                booking_id,
            } => {
                info!(
                    slot = %slot_id,
                    participant = %participant_id,
                    booking = %booking_id,
                    "propagating canceled status"
                );
                ParticipantSlotCommand::Cancel {
                    slot_id,
                    participant_id,
                    participant_type,
                    booking_id,
                }
            }
        };

        self.participant_slots.execute(&key, command).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{BookingId, ParticipantId, ParticipantStatus, ParticipantType, SlotId};
    use airslot_runtime::memory::{MemoryEventBus, MemoryEventStore};

    fn propagator() -> (SlotEventPropagator, Arc<EntityStore<ParticipantSlotAggregate>>) {
        let store = Arc::new(EntityStore::new(
            "participant-slot",
            "participant-slot-events",
            Arc::new(MemoryEventStore::new()),
            Arc::new(MemoryEventBus::new()),
        ));
        (SlotEventPropagator::new(store.clone()), store)
    }

    fn serialized(event: &SlotEvent) -> SerializedEvent {
        SerializedEvent::from_event(event, None).unwrap()
    }

    #[tokio::test]
    async fn marked_available_creates_participant_record() {
        let (propagator, store) = propagator();

        propagator
            .handle(&serialized(&SlotEvent::ParticipantMarkedAvailable {
                slot_id: SlotId::new("2025-01-01-10"),
                participant_id: ParticipantId::new("s1"),
                participant_type: ParticipantType::Student,
            }))
            .await
            .unwrap();

        let record = store.load("2025-01-01-10-s1").await.unwrap().unwrap();
        assert_eq!(record.status, ParticipantStatus::Available);
    }

    #[tokio::test]
    async fn booked_carries_booking_id_to_record() {
        let (propagator, store) = propagator();

        propagator
            .handle(&serialized(&SlotEvent::ParticipantBooked {
                slot_id: SlotId::new("2025-01-01-10"),
                participant_id: ParticipantId::new("a1"),
                participant_type: ParticipantType::Aircraft,
                booking_id: BookingId::new("bk-1"),
            }))
            .await
            .unwrap();

        let record = store.load("2025-01-01-10-a1").await.unwrap().unwrap();
        assert_eq!(record.status, ParticipantStatus::Booked);
        assert_eq!(record.booking_id, Some(BookingId::new("bk-1")));
    }

    #[tokio::test]
    async fn redelivered_event_is_applied_once_in_effect() {
        let (propagator, store) = propagator();
        let event = serialized(&SlotEvent::ParticipantMarkedAvailable {
            slot_id: SlotId::new("2025-01-01-10"),
            participant_id: ParticipantId::new("s1"),
            participant_type: ParticipantType::Student,
        });

        propagator.handle(&event).await.unwrap();
        propagator.handle(&event).await.unwrap();

        let events = store
            .event_store()
            .load_events(store.stream_id("2025-01-01-10-s1"), None)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
    }
}
