//! Configuration management for the marketplace.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use ticket_ledger_runtime::{RetryPolicy, RuntimeConfig};

/// Contract the marketplace talks to unless `CONTRACT_ADDRESS` says otherwise.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Ticketing contract address
    pub contract_address: String,
    /// Ledger submission and confirmation bounds
    pub ledger: LedgerConfig,
    /// Reconciliation read retries
    pub reconcile: ReconcileConfig,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Submission acknowledgment bound in milliseconds (default: 10000)
    pub submission_timeout_ms: u64,
    /// Receipt bound in milliseconds (default: 60000)
    pub confirmation_timeout_ms: u64,
    /// Per-call latency of the simulated ledger in milliseconds (default: 50)
    pub demo_latency_ms: u64,
}

/// Reconciliation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Retries per ledger read (default: 3)
    pub max_retries: usize,
    /// First backoff delay in milliseconds (default: 250)
    pub initial_delay_ms: u64,
    /// Backoff cap in milliseconds (default: 5000)
    pub max_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Missing or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            contract_address: lookup("CONTRACT_ADDRESS")
                .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_string()),
            ledger: LedgerConfig {
                submission_timeout_ms: lookup("LEDGER_SUBMISSION_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
                confirmation_timeout_ms: lookup("LEDGER_CONFIRMATION_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60_000),
                demo_latency_ms: lookup("DEMO_LEDGER_LATENCY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(50),
            },
            reconcile: ReconcileConfig {
                max_retries: lookup("RECONCILE_MAX_RETRIES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
                initial_delay_ms: lookup("RECONCILE_INITIAL_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(250),
                max_delay_ms: lookup("RECONCILE_MAX_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5_000),
            },
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Engine bounds derived from this configuration
    #[must_use]
    pub fn runtime(&self) -> RuntimeConfig {
        let read_retry = RetryPolicy::builder()
            .max_retries(self.reconcile.max_retries)
            .initial_delay(Duration::from_millis(self.reconcile.initial_delay_ms))
            .max_delay(Duration::from_millis(self.reconcile.max_delay_ms))
            .build();

        RuntimeConfig::default()
            .with_submission_timeout(Duration::from_millis(self.ledger.submission_timeout_ms))
            .with_confirmation_timeout(Duration::from_millis(self.ledger.confirmation_timeout_ms))
            .with_read_retry(read_retry)
    }

    /// Latency injected into the simulated ledger
    #[must_use]
    pub const fn demo_latency(&self) -> Duration {
        Duration::from_millis(self.ledger.demo_latency_ms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(config.ledger.submission_timeout_ms, 10_000);
        assert_eq!(config.ledger.confirmation_timeout_ms, 60_000);
        assert_eq!(config.reconcile.max_retries, 3);
        assert_eq!(config.log_level, "info");

        let runtime = config.runtime();
        assert_eq!(runtime.confirmation_timeout, Duration::from_secs(60));
        assert_eq!(runtime.read_retry.max_retries, 3);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LEDGER_CONFIRMATION_TIMEOUT_MS", "1500"),
            ("RECONCILE_MAX_RETRIES", "not-a-number"),
            ("CONTRACT_ADDRESS", "0xabc"),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.contract_address, "0xabc");
        assert_eq!(config.runtime().confirmation_timeout, Duration::from_millis(1500));
        assert_eq!(config.reconcile.max_retries, 3);
    }
}
