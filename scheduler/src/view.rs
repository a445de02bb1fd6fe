//! Participant-slots materialized view.
//!
//! The queryable read model: one denormalized row per (slot,
//! participant), built from participant-slot events and replaced
//! wholesale on each new event. Unmarking deletes the row. Rows are
//! indexed by participant so the two query shapes — all slots for a
//! participant, and slots for a participant filtered by status — stay
//! cheap.
//!
//! The view is eventually consistent with the booking slot: a command's
//! acknowledgment does not wait for the row update, so readers may
//! briefly see stale rows. Being derived state, the view can be dropped
//! (`reset`) and rebuilt by replaying the participant-slot events.

use crate::aggregates::ParticipantSlotEvent;
use crate::types::{BookingId, ParticipantId, ParticipantStatus, ParticipantType, SlotId};
use airslot_core::event::{Event, SerializedEvent};
use airslot_runtime::{EventHandler, HandlerError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// One row of the read model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRow {
    /// Slot identifier.
    pub slot_id: SlotId,
    /// Participant identifier.
    pub participant_id: ParticipantId,
    /// Participant role.
    pub participant_type: ParticipantType,
    /// Booking id for booked/canceled rows.
    pub booking_id: Option<BookingId>,
    /// Current status of the participant within the slot.
    pub status: ParticipantStatus,
}

#[derive(Default)]
struct ViewState {
    rows: HashMap<(SlotId, ParticipantId), SlotRow>,
    by_participant: HashMap<ParticipantId, BTreeSet<SlotId>>,
}

impl ViewState {
    fn upsert(&mut self, row: SlotRow) {
        self.by_participant
            .entry(row.participant_id.clone())
            .or_default()
            .insert(row.slot_id.clone());
        self.rows
            .insert((row.slot_id.clone(), row.participant_id.clone()), row);
    }

    fn delete(&mut self, slot_id: &SlotId, participant_id: &ParticipantId) {
        self.rows
            .remove(&(slot_id.clone(), participant_id.clone()));
        if let Some(slots) = self.by_participant.get_mut(participant_id) {
            slots.remove(slot_id);
            if slots.is_empty() {
                self.by_participant.remove(participant_id);
            }
        }
    }
}

/// In-memory materialized view over participant-slot events.
#[derive(Default)]
pub struct ParticipantSlotsView {
    state: RwLock<ViewState>,
}

impl ParticipantSlotsView {
    /// Create an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one projection event to the view.
    ///
    /// Applying the same event twice converges on the same row, so
    /// redelivery is harmless.
    pub fn apply(&self, event: &ParticipantSlotEvent) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            ParticipantSlotEvent::MarkedAvailable {
                slot_id,
                participant_id,
                participant_type,
            } => state.upsert(SlotRow {
                slot_id: slot_id.clone(),
                participant_id: participant_id.clone(),
                participant_type: *participant_type,
                booking_id: None,
                status: ParticipantStatus::Available,
            }),
            ParticipantSlotEvent::UnmarkedAvailable {
                slot_id,
                participant_id,
                ..
            } => {
                debug!(slot = %slot_id, participant = %participant_id, "deleting view row");
                state.delete(slot_id, participant_id);
            }
            ParticipantSlotEvent::Booked {
                slot_id,
                participant_id,
                participant_type,
                booking_id,
            } => state.upsert(SlotRow {
                slot_id: slot_id.clone(),
                participant_id: participant_id.clone(),
                participant_type: *participant_type,
                booking_id: Some(booking_id.clone()),
                status: ParticipantStatus::Booked,
            }),
            ParticipantSlotEvent::Canceled {
                slot_id,
                participant_id,
                participant_type,
                booking_id,
            } => state.upsert(SlotRow {
                slot_id: slot_id.clone(),
                participant_id: participant_id.clone(),
                participant_type: *participant_type,
                booking_id: Some(booking_id.clone()),
                status: ParticipantStatus::Canceled,
            }),
        }
    }

    /// All rows for a participant, ordered by slot id.
    #[must_use]
    pub fn by_participant(&self, participant_id: &ParticipantId) -> Vec<SlotRow> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .by_participant
            .get(participant_id)
            .into_iter()
            .flatten()
            .filter_map(|slot_id| {
                state
                    .rows
                    .get(&(slot_id.clone(), participant_id.clone()))
                    .cloned()
            })
            .collect()
    }

    /// Rows for a participant with the given status.
    ///
    /// The status string is matched case-insensitively against
    /// `available`, `unavailable`, `booked` and `canceled`; anything
    /// else matches no row.
    #[must_use]
    pub fn by_participant_and_status(
        &self,
        participant_id: &ParticipantId,
        status: &str,
    ) -> Vec<SlotRow> {
        let Ok(status) = status.parse::<ParticipantStatus>() else {
            return Vec::new();
        };
        self.by_participant(participant_id)
            .into_iter()
            .filter(|row| row.status == status)
            .collect()
    }

    /// Number of rows currently in the view.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .len()
    }

    /// Drop all rows, e.g. before a rebuild by replay.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = ViewState::default();
    }
}

#[async_trait]
impl EventHandler for ParticipantSlotsView {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let event = ParticipantSlotEvent::from_bytes(&event.data)?;
        self.apply(&event);
        Ok(())
    }
}
