//! # Ticket Ledger Core
//!
//! Domain types and local bookkeeping for the ticket lifecycle engine.
//!
//! Ownership and payment ultimately live on a remote, asynchronous, fee-bearing
//! ledger. This crate holds the local view of that world:
//!
//! - [`catalog::EventCatalog`]: events, supply and resale ceilings
//! - [`registry::TicketRegistry`]: tickets, holders, resale and verification flags
//! - [`sync::SyncState`]: the per-record pending / unknown sub-state that ties a
//!   local record to an in-flight ledger transaction
//! - [`ledger::LedgerRpc`]: the seam to the remote ledger (implemented by a real
//!   transport or by the in-memory ledger in the testing crate)
//!
//! Nothing in this crate performs I/O. Orchestration (optimistic mutation,
//! submission, commit / rollback / quarantine) lives in the runtime crate.
//!
//! ## Example
//!
//! ```
//! use ticket_ledger_core::catalog::EventCatalog;
//! use ticket_ledger_core::types::{EventSpec, Price};
//!
//! let mut catalog = EventCatalog::new();
//! let spec = EventSpec::new(
//!     "Test",
//!     10,
//!     Price::parse("0.1").unwrap(),
//!     Price::parse("0.15").unwrap(),
//! );
//! let id = catalog.create(spec).unwrap().id;
//!
//! catalog.decrement_available(id, 3).unwrap();
//! assert_eq!(catalog.get(id).unwrap().available, 7);
//! ```

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod sync;
pub mod types;

/// Environment module - injected dependencies
///
/// Records carry timestamps for when they entered a pending or quarantined
/// sub-state. Time is read through [`Clock`](environment::Clock) so tests can
/// pin it.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use catalog::EventCatalog;
pub use error::TicketingError;
pub use registry::TicketRegistry;
pub use sync::{EventOp, RecordKey, SyncState, TicketOp};
pub use types::{Address, Category, Event, EventId, EventSpec, Price, ResaleState, Ticket, TicketId};
