//! Stream identification and versioning for event sourcing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `StreamId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream ID: {0}")]
pub struct ParseStreamIdError(String);

/// Unique identifier for an event stream (one aggregate instance).
///
/// Examples: `"booking-slot-2025-01-01-10"`, `"participant-slot-2025-01-01-10-s1"`.
///
/// `FromStr` validates input (rejects empty strings); `new()` and the
/// `From` impls skip validation and are meant for application-controlled
/// keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new `StreamId` from a trusted string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The stream ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the `StreamId`, returning the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamId {
    type Err = ParseStreamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStreamIdError("stream ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Event count / position of a stream, used for optimistic concurrency.
///
/// A stream with `n` events is at version `n`; appending `k` events moves
/// it to `n + k`. An append that states an `expected` version which no
/// longer matches the stream fails instead of clobbering concurrent
/// writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of a stream with no events.
    pub const INITIAL: Self = Self(0);

    /// Create a `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Whether this is the initial version (0).
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_id_roundtrip() {
        let id = StreamId::new("booking-slot-2025-01-01-10");
        assert_eq!(id.as_str(), "booking-slot-2025-01-01-10");
        assert_eq!(format!("{id}"), "booking-slot-2025-01-01-10");
        assert_eq!(id.clone().into_inner(), "booking-slot-2025-01-01-10");
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if parse fails
    fn parse_validates_empty() {
        assert!("".parse::<StreamId>().is_err());
        let parsed: StreamId = "slot-1".parse().expect("parse should succeed");
        assert_eq!(parsed, StreamId::new("slot-1"));
    }

    #[test]
    fn version_progression() {
        assert!(Version::INITIAL.is_initial());
        let v1 = Version::INITIAL.next();
        assert_eq!(v1, Version::new(1));
        assert!(v1 > Version::INITIAL);
        assert_eq!(u64::from(v1), 1);
    }
}
