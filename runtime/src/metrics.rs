//! Prometheus metrics for the ticket lifecycle engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ticketing_operations_total{operation,outcome}` - Reconciler operations by outcome
//! - `ticketing_tickets_minted_total` - Tickets minted locally after confirmation
//! - `ticketing_events_created_total` - Events confirmed by the ledger
//! - `ticketing_reconciliations_total{resolution}` - Quarantine resolutions
//!
//! ## Gauges
//! - `ticketing_quarantined_records` - Records currently in the unknown sub-state
//!
//! ## Histograms
//! - `ticketing_confirmation_seconds` - Submission to receipt latency
//!
//! # Example
//!
//! ```rust,no_run
//! use ticket_ledger_runtime::metrics;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = metrics::install_prometheus()?;
//! // ... run operations ...
//! println!("{}", handle.render());
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;
use ticket_ledger_core::error::TicketingError;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// How an operation ended, as a metric label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Ledger confirmed; optimistic mutation is final
    Confirmed,
    /// Local pre-check failed; no remote call
    Rejected,
    /// Record busy or quarantined
    Conflict,
    /// Ledger reverted; mutation rolled back
    Reverted,
    /// No confirmation in time; record quarantined
    Timeout,
    /// Duplicate verification at the gate
    AlreadyVerified,
    /// Network failure before submission
    TransportError,
}

impl Outcome {
    /// Classifies a failed operation
    #[must_use]
    pub const fn of_error(err: &TicketingError) -> Self {
        match err {
            TicketingError::ConflictPending { .. } => Self::Conflict,
            TicketingError::Timeout { .. } => Self::Timeout,
            TicketingError::AlreadyVerified { .. } => Self::AlreadyVerified,
            TicketingError::Transport(_) => Self::TransportError,
            TicketingError::RemoteRejected { .. }
            | TicketingError::InsufficientPayment { .. }
            | TicketingError::PriceExceedsCeiling { .. } => Self::Reverted,
            _ => Self::Rejected,
        }
    }

    /// Label value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Conflict => "conflict",
            Self::Reverted => "reverted",
            Self::Timeout => "timeout",
            Self::AlreadyVerified => "already_verified",
            Self::TransportError => "transport_error",
        }
    }
}

/// Build the Prometheus recorder, install it globally and register descriptions.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed in
/// this process.
pub fn install_prometheus() -> Result<PrometheusHandle, MetricsError> {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("ticketing_confirmation_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0, 30.0, 60.0],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?;

    let handle = builder
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    Ok(handle)
}

/// Register all metric descriptions.
///
/// Called by [`install_prometheus`]; safe to call again.
pub fn register_metrics() {
    describe_counter!(
        "ticketing_operations_total",
        "Reconciler operations by operation and outcome"
    );
    describe_counter!(
        "ticketing_tickets_minted_total",
        "Tickets minted locally after a confirmed primary sale"
    );
    describe_counter!(
        "ticketing_events_created_total",
        "Events confirmed by the ledger"
    );
    describe_counter!(
        "ticketing_reconciliations_total",
        "Quarantined records resolved by a ledger read, by resolution"
    );
    describe_gauge!(
        "ticketing_quarantined_records",
        "Records awaiting reconciliation after a confirmation timeout"
    );
    describe_histogram!(
        "ticketing_confirmation_seconds",
        "Time from submission to receipt"
    );

    tracing::debug!("Ticketing metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record the outcome of a reconciler operation.
pub fn record_operation(operation: &'static str, outcome: Outcome) {
    metrics::counter!(
        "ticketing_operations_total",
        "operation" => operation,
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record receipt latency for a confirmed or reverted transaction.
pub fn record_confirmation(elapsed: Duration) {
    metrics::histogram!("ticketing_confirmation_seconds").record(elapsed.as_secs_f64());
}

/// Record a record entering quarantine.
pub fn record_quarantined() {
    metrics::gauge!("ticketing_quarantined_records").increment(1.0);
}

/// Record a quarantined record being resolved.
pub fn record_resolved(resolution: &'static str) {
    metrics::gauge!("ticketing_quarantined_records").decrement(1.0);
    metrics::counter!("ticketing_reconciliations_total", "resolution" => resolution).increment(1);
}

/// Record tickets minted locally.
pub fn record_tickets_minted(count: usize) {
    metrics::counter!("ticketing_tickets_minted_total").increment(count as u64);
}

/// Record a confirmed event creation.
pub fn record_event_created() {
    metrics::counter!("ticketing_events_created_total").increment(1);
}
