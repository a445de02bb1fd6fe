//! Configuration for the scheduler service.
//!
//! Loaded from environment variables with sensible defaults; no value is
//! required for local runs.

use airslot_runtime::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log filter directive (e.g. `info`, `scheduler=debug`).
    pub log_level: String,
    /// Per-topic event bus channel capacity.
    pub bus_capacity: usize,
    /// Initial backoff delay for propagation retries, in milliseconds.
    pub retry_initial_ms: u64,
    /// Backoff cap for propagation retries, in milliseconds.
    pub retry_max_ms: u64,
    /// Graceful shutdown timeout, in seconds.
    pub shutdown_timeout: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: env::var("AIRSLOT_LOG").unwrap_or(defaults.log_level),
            bus_capacity: env_parsed("AIRSLOT_BUS_CAPACITY", defaults.bus_capacity),
            retry_initial_ms: env_parsed("AIRSLOT_RETRY_INITIAL_MS", defaults.retry_initial_ms),
            retry_max_ms: env_parsed("AIRSLOT_RETRY_MAX_MS", defaults.retry_max_ms),
            shutdown_timeout: env_parsed("AIRSLOT_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
        }
    }

    /// Backoff policy for event consumers, derived from the retry knobs.
    #[must_use]
    pub fn consumer_retry(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(self.retry_initial_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_ms))
    }

    /// Graceful shutdown timeout as a [`Duration`].
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bus_capacity: 1024,
            retry_initial_ms: 100,
            retry_max_ms: 30_000,
            shutdown_timeout: 10,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert!(config.bus_capacity > 0);
        assert!(config.retry_initial_ms <= config.retry_max_ms);
    }

    #[test]
    fn consumer_retry_uses_knobs() {
        let config = Config {
            retry_initial_ms: 5,
            retry_max_ms: 50,
            ..Config::default()
        };
        let policy = config.consumer_retry();
        assert_eq!(policy.initial_delay, Duration::from_millis(5));
        assert_eq!(policy.max_delay, Duration::from_millis(50));
    }
}
