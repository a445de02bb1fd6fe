//! Domain types for the flight-training scheduler.
//!
//! A training flight needs three distinct participants — a student, an
//! aircraft and an instructor — simultaneously available in the same
//! timeslot before it can be booked. The types here carry that model:
//! identifier newtypes, the [`Participant`] value, and the [`Timeslot`]
//! state with its pure query and fold functions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role a participant plays in a training flight.
///
/// Identity of a participant is `(id, type)`; ids are unique across
/// types in practice, but the type is always carried to disambiguate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantType {
    /// The trainee flying the slot.
    Student,
    /// The aircraft flown.
    Aircraft,
    /// The certified flight instructor.
    Instructor,
}

/// Error for parsing a [`ParticipantType`] from a string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid participant type: {0}")]
pub struct ParseParticipantTypeError(String);

impl fmt::Display for ParticipantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Student => "student",
            Self::Aircraft => "aircraft",
            Self::Instructor => "instructor",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ParticipantType {
    type Err = ParseParticipantTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "aircraft" => Ok(Self::Aircraft),
            "instructor" => Ok(Self::Instructor),
            other => Err(ParseParticipantTypeError(other.to_string())),
        }
    }
}

/// Identifier of a participant (student, aircraft or instructor).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

/// Identifier of a bookable timeslot, encoding date and hour
/// (`"2025-01-01-10"`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

/// Caller-supplied identifier of a booking, unique per slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Create a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty or whitespace-only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(ParticipantId);
string_id!(SlotId);
string_id!(BookingId);

/// A participant of a training flight.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier.
    pub id: ParticipantId,
    /// The role this participant fills.
    pub participant_type: ParticipantType,
}

impl Participant {
    /// Create a participant.
    #[must_use]
    pub fn new(id: impl Into<ParticipantId>, participant_type: ParticipantType) -> Self {
        Self {
            id: id.into(),
            participant_type,
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.participant_type)
    }
}

/// Status of a participant within one slot, as tracked by the derived
/// per-(slot, participant) record and the read model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantStatus {
    /// Declared available for booking.
    Available,
    /// No longer available; the record is logically removed.
    Unavailable,
    /// Part of a confirmed booking.
    Booked,
    /// The booking was canceled; not automatically available again.
    Canceled,
}

/// Error for parsing a [`ParticipantStatus`] from a string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid status: {0}")]
pub struct ParseStatusError(String);

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Booked => "booked",
            Self::Canceled => "canceled",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ParticipantStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            "booked" => Ok(Self::Booked),
            "canceled" => Ok(Self::Canceled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A confirmed booking: one student, one aircraft, one instructor.
///
/// A booking is recorded as three per-participant events persisted in a
/// single atomic batch, and each fold step fills in one role. Outside a
/// partially applied batch all three roles are present; `is_complete`
/// reports that.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// The booked student.
    pub student: Option<Participant>,
    /// The booked aircraft.
    pub aircraft: Option<Participant>,
    /// The booked instructor.
    pub instructor: Option<Participant>,
}

impl Booking {
    /// Fill in the role matching the participant's type.
    fn assign(&mut self, participant: Participant) {
        match participant.participant_type {
            ParticipantType::Student => self.student = Some(participant),
            ParticipantType::Aircraft => self.aircraft = Some(participant),
            ParticipantType::Instructor => self.instructor = Some(participant),
        }
    }

    /// All participants of this booking.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        [&self.student, &self.aircraft, &self.instructor]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Whether all three roles are filled.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.student.is_some() && self.aircraft.is_some() && self.instructor.is_some()
    }
}

/// State of one bookable timeslot.
///
/// The authoritative per-slot aggregate state: who is currently declared
/// available, and which bookings exist. The query methods are pure; the
/// fold methods (`reserve`, `unreserve`, `book`, `cancel_booking`) are
/// total state transformers applied when folding events — validation
/// happens before an event is created, never during replay.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeslot {
    /// Participants currently declared available for this slot.
    pub available: HashSet<Participant>,
    /// Confirmed bookings by booking id. Entries are immutable once
    /// created; cancellation removes an entry.
    pub bookings: HashMap<BookingId, Booking>,
}

impl Timeslot {
    /// Whether a participant with this id and role is currently
    /// available.
    #[must_use]
    pub fn is_available(&self, id: &ParticipantId, participant_type: ParticipantType) -> bool {
        self.available
            .iter()
            .any(|p| p.id == *id && p.participant_type == participant_type)
    }

    /// Whether a booking with all three roles could be confirmed right
    /// now. Each participant can only serve the role matching its
    /// declared type.
    #[must_use]
    pub fn is_bookable(
        &self,
        student_id: &ParticipantId,
        aircraft_id: &ParticipantId,
        instructor_id: &ParticipantId,
    ) -> bool {
        self.is_available(student_id, ParticipantType::Student)
            && self.is_available(aircraft_id, ParticipantType::Aircraft)
            && self.is_available(instructor_id, ParticipantType::Instructor)
    }

    /// Look up a booking by id.
    #[must_use]
    pub fn find_booking(&self, booking_id: &BookingId) -> Option<&Booking> {
        self.bookings.get(booking_id)
    }

    /// Fold step: a participant was marked available.
    pub fn reserve(&mut self, participant: Participant) {
        self.available.insert(participant);
    }

    /// Fold step: a participant was unmarked.
    pub fn unreserve(&mut self, id: &ParticipantId, participant_type: ParticipantType) {
        self.available
            .retain(|p| !(p.id == *id && p.participant_type == participant_type));
    }

    /// Fold step: a participant was booked. Removes the participant from
    /// the available set and fills its role in the booking entry.
    pub fn book(&mut self, booking_id: &BookingId, participant: Participant) {
        self.unreserve(&participant.id, participant.participant_type);
        self.bookings
            .entry(booking_id.clone())
            .or_default()
            .assign(participant);
    }

    /// Fold step: a booking was canceled. Removes the entry; the
    /// participants are NOT returned to the available set.
    pub fn cancel_booking(&mut self, booking_id: &BookingId) {
        self.bookings.remove(booking_id);
    }
}

/// Routing key of the derived per-(slot, participant) entity.
///
/// The participant type is not part of the key because participant ids
/// are unique across types in this domain's identifier scheme.
#[must_use]
pub fn participant_slot_key(slot_id: &SlotId, participant_id: &ParticipantId) -> String {
    format!("{slot_id}-{participant_id}")
}

/// The slot key covering a given instant (`"%Y-%m-%d-%H"`).
///
/// Slot keys compare lexicographically in chronological order, which is
/// how "slot must be in the future" checks work.
#[must_use]
pub fn slot_key_for(time: DateTime<Utc>) -> SlotId {
    SlotId::new(time.format("%Y-%m-%d-%H").to_string())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn participant_type_parses_case_insensitively() {
        assert_eq!(
            " STUDENT ".parse::<ParticipantType>(),
            Ok(ParticipantType::Student)
        );
        assert_eq!(
            "Aircraft".parse::<ParticipantType>(),
            Ok(ParticipantType::Aircraft)
        );
        assert!("glider".parse::<ParticipantType>().is_err());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "BOOKED".parse::<ParticipantStatus>(),
            Ok(ParticipantStatus::Booked)
        );
        assert_eq!(
            " canceled ".parse::<ParticipantStatus>(),
            Ok(ParticipantStatus::Canceled)
        );
        assert!("pending".parse::<ParticipantStatus>().is_err());
        assert_eq!(ParticipantStatus::Available.to_string(), "available");
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(BookingId::new("  ").is_blank());
        assert!(!BookingId::new("bk-1").is_blank());
    }

    #[test]
    fn availability_is_per_role() {
        let mut slot = Timeslot::default();
        slot.reserve(Participant::new("s1", ParticipantType::Student));

        assert!(slot.is_available(&ParticipantId::new("s1"), ParticipantType::Student));
        // The same id does not count for a different role.
        assert!(!slot.is_available(&ParticipantId::new("s1"), ParticipantType::Aircraft));
    }

    #[test]
    fn bookable_requires_all_three_roles() {
        let mut slot = Timeslot::default();
        slot.reserve(Participant::new("s1", ParticipantType::Student));
        slot.reserve(Participant::new("a1", ParticipantType::Aircraft));

        let (s1, a1, i1) = (
            ParticipantId::new("s1"),
            ParticipantId::new("a1"),
            ParticipantId::new("i1"),
        );
        assert!(!slot.is_bookable(&s1, &a1, &i1));

        slot.reserve(Participant::new("i1", ParticipantType::Instructor));
        assert!(slot.is_bookable(&s1, &a1, &i1));
    }

    #[test]
    fn book_assembles_entry_and_consumes_availability() {
        let mut slot = Timeslot::default();
        slot.reserve(Participant::new("s1", ParticipantType::Student));
        slot.reserve(Participant::new("a1", ParticipantType::Aircraft));
        slot.reserve(Participant::new("i1", ParticipantType::Instructor));

        let booking_id = BookingId::new("bk-1");
        slot.book(&booking_id, Participant::new("s1", ParticipantType::Student));
        slot.book(&booking_id, Participant::new("a1", ParticipantType::Aircraft));
        slot.book(&booking_id, Participant::new("i1", ParticipantType::Instructor));

        let booking = slot.find_booking(&booking_id).expect("booking should exist");
        assert!(booking.is_complete());
        assert_eq!(booking.participants().count(), 3);
        assert!(slot.available.is_empty());
    }

    #[test]
    fn cancel_removes_entry_without_restoring_availability() {
        let mut slot = Timeslot::default();
        let booking_id = BookingId::new("bk-1");
        slot.book(&booking_id, Participant::new("s1", ParticipantType::Student));

        slot.cancel_booking(&booking_id);
        assert!(slot.find_booking(&booking_id).is_none());
        assert!(slot.available.is_empty());
        // Canceling again is harmless.
        slot.cancel_booking(&booking_id);
    }

    #[test]
    fn slot_keys_order_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).single();
        let later = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).single();
        let (earlier, later) = (earlier.map(slot_key_for), later.map(slot_key_for));
        assert_eq!(
            earlier.as_ref().map(SlotId::as_str),
            Some("2025-01-01-10")
        );
        assert!(earlier < later);
    }

    #[test]
    fn participant_slot_key_concatenates() {
        let key = participant_slot_key(&SlotId::new("2025-01-01-10"), &ParticipantId::new("s1"));
        assert_eq!(key, "2025-01-01-10-s1");
    }
}
