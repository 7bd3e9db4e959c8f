//! Per-record relationship to the remote ledger.
//!
//! A record is either [`Synced`](SyncState::Synced), carrying an optimistic
//! mutation whose transaction is still in flight
//! ([`Pending`](SyncState::Pending)), or quarantined after the confirmation
//! was not observed in time ([`Unknown`](SyncState::Unknown)).
//!
//! The operation stored alongside the marker records exactly what is needed to
//! undo the optimistic mutation.
//!
//! ```text
//!             begin op              confirmed
//!   Synced ─────────────► Pending ─────────────► Synced
//!     ▲                     │  │
//!     │      reverted       │  │ timeout
//!     └─────(rollback)──────┘  ▼
//!     ▲                     Unknown
//!     └───(ledger read: finalize or roll back)───┘
//! ```

use crate::ledger::TxHash;
use crate::types::{Address, EventId, Price, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sync sub-state of a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState<Op> {
    /// Local record matches the last confirmed ledger outcome
    Synced,
    /// Optimistic mutation applied; transaction in flight
    Pending {
        /// The in-flight operation
        op: Op,
        /// When the optimistic mutation was applied
        since: DateTime<Utc>,
    },
    /// Confirmation not observed within the bound; awaiting a ledger read
    Unknown {
        /// The operation whose outcome is unknown
        op: Op,
        /// When the record was quarantined
        since: DateTime<Utc>,
        /// Transaction hash, if the submission was acknowledged
        tx_hash: Option<TxHash>,
    },
}

impl<Op> Default for SyncState<Op> {
    fn default() -> Self {
        Self::Synced
    }
}

impl<Op> SyncState<Op> {
    /// No operation in flight or awaiting reconciliation
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }

    /// Transaction in flight
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Quarantined
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    /// The in-flight or quarantined operation
    #[must_use]
    pub const fn op(&self) -> Option<&Op> {
        match self {
            Self::Synced => None,
            Self::Pending { op, .. } | Self::Unknown { op, .. } => Some(op),
        }
    }
}

/// Optimistic mutations applied to an [`Event`](crate::types::Event).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOp {
    /// The record was inserted ahead of the ledger's `createEvent`
    Creation,
    /// `quantity` was deducted from `available` for `buyer`
    PrimarySale {
        /// Tickets requested
        quantity: u32,
        /// Purchasing wallet
        buyer: Address,
    },
    /// The resale window was flipped away from `previous`
    ResaleWindowToggle {
        /// Window state before the flip
        previous: bool,
    },
}

impl EventOp {
    /// Short operation label for logs and metrics
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Creation => "create_event",
            Self::PrimarySale { .. } => "buy_primary",
            Self::ResaleWindowToggle { .. } => "toggle_resale_window",
        }
    }
}

/// Optimistic mutations applied to a [`Ticket`](crate::types::Ticket).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketOp {
    /// The holder flipped the resale flag
    ResaleToggle {
        /// Flag before the flip
        previous_active: bool,
        /// Asking price before the flip
        previous_price: Option<Price>,
    },
    /// The holder listed the ticket at a new price
    ResaleListing {
        /// Flag before the listing
        previous_active: bool,
        /// Asking price before the listing
        previous_price: Option<Price>,
    },
    /// Ownership moved from `previous_owner` to `buyer`
    ResalePurchase {
        /// Seller
        previous_owner: Address,
        /// Buyer
        buyer: Address,
        /// Asking price paid
        previous_price: Option<Price>,
    },
    /// Gate verification submitted; the resale flag was cleared
    Verification {
        /// Flag before verification
        previous_active: bool,
    },
}

impl TicketOp {
    /// Short operation label for logs and metrics
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ResaleToggle { .. } => "toggle_resale",
            Self::ResaleListing { .. } => "list_resale",
            Self::ResalePurchase { .. } => "buy_resale",
            Self::Verification { .. } => "verify",
        }
    }
}

/// Names a record in either registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    /// An event in the catalog
    Event(EventId),
    /// A ticket in the registry
    Ticket(TicketId),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(id) => write!(f, "event {id}"),
            Self::Ticket(id) => write!(f, "ticket {id}"),
        }
    }
}
