//! Flight conditions check.
//!
//! Before a booking command is ever issued to the slot aggregate, the
//! service consults a conditions check for the target slot. The check is
//! an opaque boolean oracle behind the [`ConditionsCheck`] trait: the
//! booking path only depends on its `meets_requirements` contract, and a
//! missing, negative or failed report all mean "do not book".

use crate::types::SlotId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tracing::info;

/// Verdict of the conditions check for one slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionsReport {
    /// The evaluated slot.
    pub slot_id: SlotId,
    /// Whether conditions permit booking this slot.
    pub meets_requirements: bool,
}

/// Error produced when the conditions check cannot deliver a verdict.
#[derive(Error, Debug, Clone)]
#[error("conditions check failed: {0}")]
pub struct ConditionsError(String);

impl ConditionsError {
    /// Create an error with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Capability interface for the external conditions check.
pub trait ConditionsCheck: Send + Sync {
    /// Evaluate conditions for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionsError`] when no verdict could be produced;
    /// callers must treat that as "do not book".
    fn check(
        &self,
        slot_id: &SlotId,
    ) -> Pin<Box<dyn Future<Output = Result<ConditionsReport, ConditionsError>> + Send + '_>>;
}

/// Deterministic forecast-based conditions check.
///
/// Derives a forecast from the slot key alone so both verdicts are
/// reachable in demos and tests without an external weather service:
/// slots on the 13th of any month forecast thunderstorms and high winds
/// and do not meet requirements.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastConditions;

impl ForecastConditions {
    /// The forecast text for a slot.
    #[must_use]
    pub fn forecast(slot_id: &SlotId) -> &'static str {
        // The 13th is unlucky.
        if slot_id.as_str().contains("-13-") {
            "Thunderstorms and high winds expected."
        } else {
            "Clear skies, light breeze."
        }
    }
}

impl ConditionsCheck for ForecastConditions {
    fn check(
        &self,
        slot_id: &SlotId,
    ) -> Pin<Box<dyn Future<Output = Result<ConditionsReport, ConditionsError>> + Send + '_>> {
        let forecast = Self::forecast(slot_id);
        info!(slot = %slot_id, forecast, "evaluating flight conditions");

        let report = ConditionsReport {
            slot_id: slot_id.clone(),
            meets_requirements: !forecast.contains("Thunderstorms"),
        };
        Box::pin(async move { Ok(report) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clear_weather_meets_requirements() {
        let report = ForecastConditions
            .check(&SlotId::new("2025-01-01-10"))
            .await
            .unwrap();
        assert!(report.meets_requirements);
    }

    #[tokio::test]
    async fn the_thirteenth_grounds_flights() {
        let report = ForecastConditions
            .check(&SlotId::new("2025-01-13-10"))
            .await
            .unwrap();
        assert!(!report.meets_requirements);
    }
}
