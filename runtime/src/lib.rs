//! # Ticket Ledger Runtime
//!
//! Orchestration for the ticket lifecycle engine.
//!
//! This crate couples the local catalog and registry to the remote ledger
//! through a two-phase optimistic protocol.
//!
//! ## Core Components
//!
//! - **[`ContractGateway`]**: typed façade over the ledger RPC. Converts prices,
//!   submits transactions and waits for receipts within bounded timeouts
//! - **[`Reconciler`]**: runs every user operation as pre-check, optimistic
//!   mutation, submission, then commit / rollback / quarantine, and resolves
//!   quarantined records from ledger reads
//! - **[`metrics`]**: Prometheus counters, gauges and histograms
//! - **[`retry`]**: jittered exponential backoff for reconciliation reads
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ticket_ledger_core::catalog::EventCatalog;
//! use ticket_ledger_core::environment::SystemClock;
//! use ticket_ledger_core::registry::TicketRegistry;
//! use ticket_ledger_core::types::{Address, EventSpec, Price};
//! use ticket_ledger_runtime::{ContractGateway, Reconciler, RuntimeConfig};
//! use ticket_ledger_testing::{DEFAULT_CONTRACT, InMemoryLedger, LocalSigner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RuntimeConfig::default();
//! let ledger = InMemoryLedger::new().shared();
//! let gateway = Arc::new(ContractGateway::new(ledger, Address::new(DEFAULT_CONTRACT), &config));
//! gateway.initialize(LocalSigner::shared("0xOrganizer"));
//!
//! let reconciler = Reconciler::new(
//!     gateway,
//!     EventCatalog::new(),
//!     TicketRegistry::new(),
//!     Arc::new(SystemClock),
//!     &config,
//! );
//!
//! let event = reconciler
//!     .create_event(EventSpec::new("Test", 10, Price::parse("0.1")?, Price::parse("0.15")?))
//!     .await?;
//! let purchase = reconciler.buy_primary(event.id, 2).await?;
//! assert_eq!(purchase.event.available, 8);
//! # Ok(())
//! # }
//! ```

/// Runtime configuration
pub mod config;

/// Contract gateway over the ledger RPC
pub mod gateway;

/// Prometheus metrics for observability
pub mod metrics;

/// Two-phase consistency protocol
pub mod reconciler;

/// Retry logic with exponential backoff
pub mod retry;

pub use config::RuntimeConfig;
pub use gateway::{ContractGateway, EventDetails, GatewayError, GatewayResult, TicketDetails};
pub use reconciler::{PrimaryPurchase, ReconciliationReport, Reconciler, Resolution};
pub use retry::RetryPolicy;
