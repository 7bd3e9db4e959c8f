//! Error taxonomy shared by every engine operation.

use crate::ledger::{TxHash, Wei};
use crate::sync::RecordKey;
use crate::types::{Address, EventId, Price, TicketId};
use thiserror::Error;

/// Failures surfaced by the registries and the reconciler.
///
/// Every failure is one of two kinds, see [`leaves_state_unchanged`]:
/// nothing changed locally (pre-check failures, remote rejections after
/// rollback), or local state changed and may not match the ledger yet
/// ([`Timeout`](TicketingError::Timeout)).
///
/// [`leaves_state_unchanged`]: TicketingError::leaves_state_unchanged
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketingError {
    /// No signing identity has been bound to the gateway
    #[error("No signing identity bound; connect a wallet first")]
    NotInitialized,

    /// Local pre-check failed
    #[error("Invalid parameters: {reason}")]
    InvalidParameters {
        /// What was wrong
        reason: String,
    },

    /// Not enough primary supply left
    #[error("Insufficient supply for event {event_id}: requested {requested}, available {available}")]
    InsufficientSupply {
        /// Event
        event_id: EventId,
        /// Requested quantity
        requested: u32,
        /// Remaining supply
        available: u32,
    },

    /// A ticket with this identifier already exists
    #[error("Ticket {ticket_id} already exists")]
    DuplicateTicket {
        /// Offending identifier
        ticket_id: TicketId,
    },

    /// Resale attempted on a redeemed ticket
    #[error("Ticket {ticket_id} has been verified and can no longer be offered for resale")]
    TicketVerified {
        /// Ticket
        ticket_id: TicketId,
    },

    /// Another operation is in flight on the record, or it is quarantined
    #[error("{record} has an operation in flight or awaiting reconciliation")]
    ConflictPending {
        /// Busy record
        record: RecordKey,
    },

    /// The ledger reverted the transaction
    #[error("Ledger rejected the transaction: {reason}")]
    RemoteRejected {
        /// Revert reason reported by the ledger
        reason: String,
    },

    /// Confirmation was not observed in time; the record is quarantined
    #[error("No confirmation for {record} within {waited_ms}ms; reconciliation pending")]
    Timeout {
        /// Quarantined record
        record: RecordKey,
        /// Transaction hash, if the submission was acknowledged
        tx_hash: Option<TxHash>,
        /// How long the gateway waited
        waited_ms: u64,
    },

    /// Informational: the ticket was verified before
    #[error("Ticket {ticket_id} was already verified")]
    AlreadyVerified {
        /// Ticket
        ticket_id: TicketId,
    },

    /// The ledger refused the attached payment
    #[error("Insufficient payment: required {required}, offered {offered}")]
    InsufficientPayment {
        /// Amount the ledger expected
        required: Wei,
        /// Amount attached
        offered: Wei,
    },

    /// The ledger refused a resale listing above the ceiling
    #[error("Resale price {price} exceeds ceiling {ceiling}")]
    PriceExceedsCeiling {
        /// Requested listing price
        price: Price,
        /// Event ceiling
        ceiling: Price,
    },

    /// Creator already bound to a different address
    #[error("Event {event_id} creator already bound to {creator}")]
    AlreadyBound {
        /// Event
        event_id: EventId,
        /// Existing creator
        creator: Address,
    },

    /// Network or transport failure before the transaction was submitted
    #[error("Ledger transport error: {0}")]
    Transport(String),
}

impl TicketingError {
    /// Shorthand for [`TicketingError::InvalidParameters`]
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameters { reason: reason.into() }
    }

    /// Pre-check failure for an event id the catalog does not know
    #[must_use]
    pub fn unknown_event(event_id: EventId) -> Self {
        Self::invalid(format!("unknown event {event_id}"))
    }

    /// Pre-check failure for a ticket id the registry does not know
    #[must_use]
    pub fn unknown_ticket(ticket_id: &TicketId) -> Self {
        Self::invalid(format!("unknown ticket {ticket_id}"))
    }

    /// `true` unless local state may now diverge from the ledger.
    #[must_use]
    pub const fn leaves_state_unchanged(&self) -> bool {
        !matches!(self, Self::Timeout { .. })
    }

    /// Worth retrying later, once the record settles or the network recovers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ConflictPending { .. } | Self::Transport(_))
    }

    /// Not a failure of the underlying mutation
    #[must_use]
    pub const fn is_informational(&self) -> bool {
        matches!(self, Self::AlreadyVerified { .. })
    }
}
