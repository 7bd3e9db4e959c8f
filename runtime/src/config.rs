//! Runtime configuration: confirmation bounds and reconciliation retry policy.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds applied by the gateway and the reconciler.
///
/// # Default Values
///
/// - `submission_timeout`: 10 seconds
/// - `confirmation_timeout`: 60 seconds
/// - `read_retry`: [`RetryPolicy::default`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How long to wait for the node to acknowledge a submission
    pub submission_timeout: Duration,
    /// How long to wait for a receipt once submitted
    pub confirmation_timeout: Duration,
    /// Retry policy for reconciliation reads
    pub read_retry: RetryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            submission_timeout: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(60),
            read_retry: RetryPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Set the submission acknowledgment bound
    #[must_use]
    pub const fn with_submission_timeout(mut self, timeout: Duration) -> Self {
        self.submission_timeout = timeout;
        self
    }

    /// Set the confirmation bound
    #[must_use]
    pub const fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Set the reconciliation read retry policy
    #[must_use]
    pub const fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }
}
