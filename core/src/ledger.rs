//! The remote ledger seam.
//!
//! The ledger (a ticketing smart contract) is the authoritative settlement
//! system. It is reached through [`LedgerRpc`], whose primitives mirror a
//! JSON-RPC node: submit a transaction, wait for its receipt, read contract
//! state. Amounts cross this seam as [`Wei`], the ledger's integer minor unit.
//!
//! # Implementations
//!
//! - `InMemoryLedger` (testing crate) - simulated contract with fault injection
//!
//! # Dyn Compatibility
//!
//! Like the other environment traits, [`LedgerRpc`] returns
//! `Pin<Box<dyn Future>>` instead of using `async fn` so it can be shared as
//! `Arc<dyn LedgerRpc>`.

use crate::types::{Address, EventId, TicketId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Amount in the ledger's integer minor unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wei(pub u128);

impl Wei {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Multiplies by a quantity with overflow checking
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u128) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

/// Transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Wraps raw hash bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw hash bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

/// A contract method invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ContractCall {
    /// `createEvent(name, maxSupply, price, maxResalePrice)`
    CreateEvent {
        /// Event name
        name: String,
        /// Total supply
        max_supply: u32,
        /// Unit price
        price: Wei,
        /// Resale ceiling
        max_resale_price: Wei,
    },
    /// `purchaseTicket(eventId, amount)` with `value = price * amount`
    PurchaseTicket {
        /// Event
        event_id: EventId,
        /// Quantity
        amount: u32,
    },
    /// `toggleResaleWindow(eventId)`
    ToggleResaleWindow {
        /// Event
        event_id: EventId,
    },
    /// `listTicketForResale(eventId, tokenId, price)`
    ListTicketForResale {
        /// Event
        event_id: EventId,
        /// Ticket
        ticket_id: TicketId,
        /// Asking price
        price: Wei,
    },
    /// `delistTicket(eventId, tokenId)`
    DelistTicket {
        /// Event
        event_id: EventId,
        /// Ticket
        ticket_id: TicketId,
    },
    /// `purchaseResaleTicket(eventId, tokenId, seller)` with `value = price`
    PurchaseResaleTicket {
        /// Event
        event_id: EventId,
        /// Ticket
        ticket_id: TicketId,
        /// Current holder
        seller: Address,
    },
    /// `verifyMyTicket(eventId, ticketId)`
    VerifyTicket {
        /// Event
        event_id: EventId,
        /// Ticket
        ticket_id: TicketId,
    },
}

impl ContractCall {
    /// Contract method name
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::CreateEvent { .. } => "createEvent",
            Self::PurchaseTicket { .. } => "purchaseTicket",
            Self::ToggleResaleWindow { .. } => "toggleResaleWindow",
            Self::ListTicketForResale { .. } => "listTicketForResale",
            Self::DelistTicket { .. } => "delistTicket",
            Self::PurchaseResaleTicket { .. } => "purchaseResaleTicket",
            Self::VerifyTicket { .. } => "verifyMyTicket",
        }
    }
}

/// A transaction ready for submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Contract address
    pub to: Address,
    /// Method and arguments
    pub call: ContractCall,
    /// Attached payment
    pub value: Wei,
}

/// Acknowledgment that a transaction was accepted for inclusion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Hash to wait on
    pub tx_hash: TxHash,
}

/// Why the contract reverted.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevertReason {
    /// Attached value does not match the required payment
    #[error("insufficient payment: required {required}, offered {offered}")]
    InsufficientPayment {
        /// Required value
        required: Wei,
        /// Attached value
        offered: Wei,
    },
    /// Not enough supply left
    #[error("event {event_id} sold out: requested {requested}, available {available}")]
    SoldOut {
        /// Event
        event_id: EventId,
        /// Requested
        requested: u32,
        /// Remaining
        available: u32,
    },
    /// No such event
    #[error("unknown event {event_id}")]
    UnknownEvent {
        /// Event
        event_id: EventId,
    },
    /// No such ticket
    #[error("unknown ticket {ticket_id}")]
    UnknownTicket {
        /// Ticket
        ticket_id: TicketId,
    },
    /// Listing above the event ceiling
    #[error("price {price} exceeds resale ceiling {ceiling}")]
    PriceExceedsCeiling {
        /// Listing price
        price: Wei,
        /// Ceiling
        ceiling: Wei,
    },
    /// Resale window closed for the event
    #[error("resale window closed for event {event_id}")]
    ResaleWindowClosed {
        /// Event
        event_id: EventId,
    },
    /// Caller or named seller does not hold the ticket
    #[error("not the holder of ticket {ticket_id}")]
    NotTicketOwner {
        /// Ticket
        ticket_id: TicketId,
    },
    /// Ticket is not offered for resale
    #[error("ticket {ticket_id} is not listed for resale")]
    NotListed {
        /// Ticket
        ticket_id: TicketId,
    },
    /// Ticket was already redeemed
    #[error("ticket {ticket_id} already verified")]
    AlreadyVerified {
        /// Ticket
        ticket_id: TicketId,
    },
    /// Caller lacks the role required by the method
    #[error("caller is not authorized")]
    Unauthorized,
    /// Malformed arguments
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Receipt status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Executed
    Success,
    /// Included but reverted
    Reverted(RevertReason),
}

/// Contract log emitted by a successful transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerLog {
    /// `EventCreated(eventId, creator)`
    EventCreated {
        /// Assigned id
        event_id: EventId,
        /// Creating wallet
        creator: Address,
    },
    /// `TicketsMinted(eventId, owner, tokenIds)`
    TicketsMinted {
        /// Event
        event_id: EventId,
        /// Recipient
        owner: Address,
        /// Minted ids
        ticket_ids: SmallVec<[TicketId; 4]>,
    },
    /// `ResaleWindowToggled(eventId, open)`
    ResaleWindowToggled {
        /// Event
        event_id: EventId,
        /// New state
        open: bool,
    },
    /// `TicketListed(eventId, tokenId, price)`
    TicketListed {
        /// Event
        event_id: EventId,
        /// Ticket
        ticket_id: TicketId,
        /// Asking price
        price: Wei,
    },
    /// `TicketDelisted(eventId, tokenId)`
    TicketDelisted {
        /// Event
        event_id: EventId,
        /// Ticket
        ticket_id: TicketId,
    },
    /// `TicketResold(eventId, tokenId, seller, buyer, price)`
    TicketResold {
        /// Event
        event_id: EventId,
        /// Ticket
        ticket_id: TicketId,
        /// Previous holder
        seller: Address,
        /// New holder
        buyer: Address,
        /// Price paid
        price: Wei,
    },
    /// `TicketVerified(eventId, tokenId)`
    TicketVerified {
        /// Event
        event_id: EventId,
        /// Ticket
        ticket_id: TicketId,
    },
}

/// Outcome of an included transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Including block
    pub block_number: u64,
    /// Success or revert
    pub status: ReceiptStatus,
    /// Emitted logs (empty on revert)
    pub logs: Vec<LedgerLog>,
}

impl TransactionReceipt {
    /// Ticket ids minted by this transaction, with their recipient
    pub fn minted_tickets(&self) -> impl Iterator<Item = (&Address, &TicketId)> {
        self.logs.iter().flat_map(|log| match log {
            LedgerLog::TicketsMinted { owner, ticket_ids, .. } => {
                ticket_ids.iter().map(move |id| (owner, id)).collect::<Vec<_>>()
            }
            _ => Vec::new(),
        })
    }

    /// Event id assigned by a `createEvent` transaction
    #[must_use]
    pub fn created_event(&self) -> Option<EventId> {
        self.logs.iter().find_map(|log| match log {
            LedgerLog::EventCreated { event_id, .. } => Some(*event_id),
            _ => None,
        })
    }
}

/// Event state as stored by the contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// Event
    pub event_id: EventId,
    /// Name
    pub name: String,
    /// Organizer
    pub creator: Address,
    /// Unit price
    pub price: Wei,
    /// Resale ceiling
    pub max_resale_price: Wei,
    /// Total supply
    pub max_supply: u32,
    /// Remaining supply
    pub available: u32,
    /// Resale window
    pub resale_window_open: bool,
}

/// Ticket state as stored by the contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSnapshot {
    /// Ticket
    pub ticket_id: TicketId,
    /// Event
    pub event_id: EventId,
    /// Holder
    pub owner: Address,
    /// Listed for resale
    pub resale_active: bool,
    /// Listing price
    pub price: Option<Wei>,
    /// Redeemed
    pub verified: bool,
}

/// Failures talking to the ledger node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Rejected during submission (simulation / gas estimation revert)
    #[error("Transaction rejected: {0}")]
    Rejected(RevertReason),

    /// Network or node failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node does not know the transaction
    #[error("Unknown transaction {0}")]
    UnknownTransaction(TxHash),
}

/// Opaque signing capability supplied by the wallet.
///
/// The engine only ever asks for the address; signing itself is delegated to
/// the ledger transport.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Address the signer acts for
    fn address(&self) -> &Address;
}

/// Boxed future returned by [`LedgerRpc`] methods.
pub type RpcFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RpcError>> + Send + 'a>>;

/// Transaction and query primitives of the remote ledger.
pub trait LedgerRpc: Send + Sync {
    /// Submit a signed transaction and return once the node acknowledges it.
    ///
    /// # Errors
    ///
    /// [`RpcError::Rejected`] if the node refuses the transaction up front,
    /// [`RpcError::Transport`] on network failure.
    fn send_transaction(
        &self,
        signer: Arc<dyn Signer>,
        request: TransactionRequest,
    ) -> RpcFuture<'_, PendingTransaction>;

    /// Wait until the transaction is included and return its receipt.
    ///
    /// May never resolve if the transaction is dropped; callers bound it with
    /// a timeout.
    ///
    /// # Errors
    ///
    /// [`RpcError::Transport`] on network failure,
    /// [`RpcError::UnknownTransaction`] if the node has never seen the hash.
    fn wait_for_receipt(&self, tx_hash: TxHash) -> RpcFuture<'_, TransactionReceipt>;

    /// Read an event (`events(eventId)`).
    ///
    /// # Errors
    ///
    /// [`RpcError::Transport`] on network failure.
    fn event(&self, contract: Address, event_id: EventId) -> RpcFuture<'_, Option<EventSnapshot>>;

    /// Read a ticket.
    ///
    /// # Errors
    ///
    /// [`RpcError::Transport`] on network failure.
    fn ticket(
        &self,
        contract: Address,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> RpcFuture<'_, Option<TicketSnapshot>>;

    /// Read every ticket of `event_id` held by `owner`.
    ///
    /// # Errors
    ///
    /// [`RpcError::Transport`] on network failure.
    fn tickets_owned_by(
        &self,
        contract: Address,
        event_id: EventId,
        owner: Address,
    ) -> RpcFuture<'_, Vec<TicketSnapshot>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_tx_hash_display_is_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let hash = TxHash::from_bytes(bytes);
        let text = hash.to_string();
        assert!(text.starts_with("0xab00"));
        assert!(text.ends_with("01"));
        assert_eq!(text.len(), 66);
    }

    #[test]
    fn test_contract_call_serializes_with_method_tag() {
        let call = ContractCall::PurchaseTicket { event_id: EventId::new(1), amount: 2 };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["method"], "purchaseTicket");
        assert_eq!(call.method_name(), "purchaseTicket");
        assert_eq!(
            ContractCall::VerifyTicket { event_id: EventId::new(1), ticket_id: TicketId::new("T-001") }
                .method_name(),
            "verifyMyTicket"
        );
    }

    #[test]
    fn test_receipt_extracts_minted_tickets() {
        let owner = Address::new("0xBuyer");
        let receipt = TransactionReceipt {
            tx_hash: TxHash::from_bytes([1; 32]),
            block_number: 7,
            status: ReceiptStatus::Success,
            logs: vec![
                LedgerLog::EventCreated { event_id: EventId::new(8), creator: owner.clone() },
                LedgerLog::TicketsMinted {
                    event_id: EventId::new(8),
                    owner: owner.clone(),
                    ticket_ids: smallvec![TicketId::new("T-010"), TicketId::new("T-011")],
                },
            ],
        };

        let minted: Vec<_> = receipt.minted_tickets().map(|(_, id)| id.as_str()).collect();
        assert_eq!(minted, vec!["T-010", "T-011"]);
        assert_eq!(receipt.created_event(), Some(EventId::new(8)));
    }

    #[test]
    fn test_wei_checked_mul() {
        assert_eq!(Wei(5).checked_mul(3), Some(Wei(15)));
        assert_eq!(Wei(u128::MAX).checked_mul(2), None);
    }
}
