//! Contract gateway - typed façade over the remote ledger.
//!
//! The gateway turns domain operations into contract transactions and waits
//! for their receipts. It owns two concerns the rest of the engine never sees:
//!
//! - unit conversion: [`Price`] (decimal currency) to [`Wei`] (ledger minor
//!   unit) and back happens only here
//! - confirmation waiting: submission and receipt are each bounded by the
//!   configured timeouts
//!
//! The gateway performs no retries. A mutating call that the ledger may have
//! accepted is reported as [`GatewayError::Timeout`] so the caller can
//! quarantine the affected record.

use crate::config::RuntimeConfig;
use crate::metrics;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use ticket_ledger_core::error::TicketingError;
use ticket_ledger_core::ledger::{
    ContractCall, EventSnapshot, LedgerRpc, ReceiptStatus, RevertReason, RpcError, Signer,
    TicketSnapshot, TransactionReceipt, TransactionRequest, TxHash, Wei,
};
use ticket_ledger_core::sync::RecordKey;
use ticket_ledger_core::types::{Address, EventId, Price, TicketId};
use tokio::time::{Instant, timeout};

/// Gateway result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No signer bound
    #[error("Gateway not initialized: no signer bound")]
    NotInitialized,

    /// Arguments rejected before submission
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The ledger refused the attached payment
    #[error("Insufficient payment: required {required}, offered {offered}")]
    InsufficientPayment {
        /// Required value
        required: Wei,
        /// Attached value
        offered: Wei,
    },

    /// The ledger refused a listing above the resale ceiling
    #[error("Price {price} exceeds resale ceiling {ceiling}")]
    PriceExceedsCeiling {
        /// Listing price
        price: Wei,
        /// Ceiling
        ceiling: Wei,
    },

    /// Any other revert
    #[error("Ledger rejected the transaction: {0}")]
    RemoteRejected(RevertReason),

    /// The outcome of a submitted (or possibly submitted) transaction is unknown
    #[error("No confirmation within {waited:?}")]
    Timeout {
        /// Hash, if the node acknowledged the submission
        tx_hash: Option<TxHash>,
        /// How long the gateway waited
        waited: Duration,
    },

    /// Network failure; for mutations, nothing was submitted
    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Worth retrying for read-only queries
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }

    /// The ledger may or may not have applied the transaction
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Transaction hash of an unresolved submission
    #[must_use]
    pub const fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Timeout { tx_hash, .. } => *tx_hash,
            _ => None,
        }
    }

    /// Converts into the engine taxonomy, attributing timeouts to `record`.
    #[must_use]
    pub fn into_ticketing(self, record: RecordKey) -> TicketingError {
        match self {
            Self::NotInitialized => TicketingError::NotInitialized,
            Self::InvalidParameters(reason) => TicketingError::InvalidParameters { reason },
            Self::InsufficientPayment { required, offered } => {
                TicketingError::InsufficientPayment { required, offered }
            }
            Self::PriceExceedsCeiling { price, ceiling } => TicketingError::PriceExceedsCeiling {
                price: to_price(price),
                ceiling: to_price(ceiling),
            },
            Self::RemoteRejected(RevertReason::AlreadyVerified { ticket_id }) => {
                TicketingError::AlreadyVerified { ticket_id }
            }
            Self::RemoteRejected(reason) => TicketingError::RemoteRejected { reason: reason.to_string() },
            Self::Timeout { tx_hash, waited } => TicketingError::Timeout {
                record,
                tx_hash,
                waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            },
            Self::Transport(message) => TicketingError::Transport(message),
        }
    }

    fn from_revert(reason: RevertReason) -> Self {
        match reason {
            RevertReason::InsufficientPayment { required, offered } => {
                Self::InsufficientPayment { required, offered }
            }
            RevertReason::PriceExceedsCeiling { price, ceiling } => {
                Self::PriceExceedsCeiling { price, ceiling }
            }
            other => Self::RemoteRejected(other),
        }
    }
}

/// Event state read from the contract, in engine units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDetails {
    /// Event
    pub event_id: EventId,
    /// Name
    pub name: String,
    /// Organizer
    pub creator: Address,
    /// Unit price
    pub price: Price,
    /// Resale ceiling
    pub max_resale_price: Price,
    /// Total supply
    pub max_supply: u32,
    /// Remaining supply
    pub available: u32,
    /// Resale window
    pub resale_window_open: bool,
}

impl From<EventSnapshot> for EventDetails {
    fn from(snapshot: EventSnapshot) -> Self {
        Self {
            event_id: snapshot.event_id,
            name: snapshot.name,
            creator: snapshot.creator,
            price: to_price(snapshot.price),
            max_resale_price: to_price(snapshot.max_resale_price),
            max_supply: snapshot.max_supply,
            available: snapshot.available,
            resale_window_open: snapshot.resale_window_open,
        }
    }
}

/// Ticket state read from the contract, in engine units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketDetails {
    /// Ticket
    pub ticket_id: TicketId,
    /// Event
    pub event_id: EventId,
    /// Holder
    pub owner: Address,
    /// Listed for resale
    pub resale_active: bool,
    /// Listing price
    pub price: Option<Price>,
    /// Redeemed
    pub verified: bool,
}

impl From<TicketSnapshot> for TicketDetails {
    fn from(snapshot: TicketSnapshot) -> Self {
        Self {
            ticket_id: snapshot.ticket_id,
            event_id: snapshot.event_id,
            owner: snapshot.owner,
            resale_active: snapshot.resale_active,
            price: snapshot.price.map(to_price),
            verified: snapshot.verified,
        }
    }
}

// Price carries 18 fractional digits, the same scale as the ledger's minor unit.
const fn to_wei(price: Price) -> Wei {
    Wei(price.units())
}

const fn to_price(wei: Wei) -> Price {
    Price::from_units(wei.0)
}

/// Typed façade over a [`LedgerRpc`] for one ticketing contract.
pub struct ContractGateway {
    rpc: Arc<dyn LedgerRpc>,
    contract: Address,
    signer: RwLock<Option<Arc<dyn Signer>>>,
    submission_timeout: Duration,
    confirmation_timeout: Duration,
}

impl std::fmt::Debug for ContractGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractGateway")
            .field("contract", &self.contract)
            .field("signer", &self.signer_address())
            .field("submission_timeout", &self.submission_timeout)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish_non_exhaustive()
    }
}

impl ContractGateway {
    /// Creates an unbound gateway for `contract`.
    #[must_use]
    pub fn new(rpc: Arc<dyn LedgerRpc>, contract: Address, config: &RuntimeConfig) -> Self {
        Self {
            rpc,
            contract,
            signer: RwLock::new(None),
            submission_timeout: config.submission_timeout,
            confirmation_timeout: config.confirmation_timeout,
        }
    }

    /// Contract address
    #[must_use]
    pub const fn contract(&self) -> &Address {
        &self.contract
    }

    /// Binds the signing identity used for every mutating call.
    ///
    /// Rebinding replaces the previous signer.
    pub fn initialize(&self, signer: Arc<dyn Signer>) {
        let address = signer.address().clone();
        let previous = self
            .signer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(signer);

        match previous {
            Some(old) if *old.address() != address => {
                tracing::info!(previous = %old.address(), signer = %address, "Gateway signer rebound");
            }
            Some(_) => tracing::debug!(signer = %address, "Gateway signer refreshed"),
            None => tracing::info!(signer = %address, contract = %self.contract, "Gateway initialized"),
        }
    }

    /// Address of the bound signer, if any
    #[must_use]
    pub fn signer_address(&self) -> Option<Address> {
        self.signer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|signer| signer.address().clone())
    }

    /// The bound signer.
    ///
    /// Callers take it once per operation and pass it to every submission of
    /// that operation, so a rebind mid-flight cannot change who signs.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotInitialized`] if no signer is bound.
    pub fn bound_signer(&self) -> GatewayResult<Arc<dyn Signer>> {
        self.signer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GatewayError::NotInitialized)
    }

    /// `createEvent(name, maxSupply, price, maxResalePrice)`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RemoteRejected`], [`GatewayError::Timeout`],
    /// [`GatewayError::Transport`].
    pub async fn create_event(
        &self,
        signer: &Arc<dyn Signer>,
        name: &str,
        max_supply: u32,
        price: Price,
        max_resale_price: Price,
    ) -> GatewayResult<TransactionReceipt> {
        let call = ContractCall::CreateEvent {
            name: name.to_string(),
            max_supply,
            price: to_wei(price),
            max_resale_price: to_wei(max_resale_price),
        };
        self.transact(signer, call, Wei::ZERO).await
    }

    /// `purchaseTicket(eventId, quantity)` paying `unit_price × quantity`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidParameters`] for a zero quantity or an
    /// overflowing total, [`GatewayError::InsufficientPayment`] if the ledger
    /// disagrees with the total, plus the errors of [`Self::create_event`].
    pub async fn purchase_ticket(
        &self,
        signer: &Arc<dyn Signer>,
        event_id: EventId,
        quantity: u32,
        unit_price: Price,
    ) -> GatewayResult<TransactionReceipt> {
        if quantity == 0 {
            return Err(GatewayError::InvalidParameters("quantity must be greater than zero".into()));
        }
        let total = to_wei(unit_price)
            .checked_mul(quantity)
            .ok_or_else(|| GatewayError::InvalidParameters(format!("payment for {quantity} tickets overflows")))?;

        self.transact(signer, ContractCall::PurchaseTicket { event_id, amount: quantity }, total)
            .await
    }

    /// `toggleResaleWindow(eventId)`.
    ///
    /// # Errors
    ///
    /// See [`Self::create_event`].
    pub async fn toggle_resale_window(
        &self,
        signer: &Arc<dyn Signer>,
        event_id: EventId,
    ) -> GatewayResult<TransactionReceipt> {
        self.transact(signer, ContractCall::ToggleResaleWindow { event_id }, Wei::ZERO)
            .await
    }

    /// `listTicketForResale(eventId, ticketId, price)`.
    ///
    /// The ledger's ceiling check is authoritative.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PriceExceedsCeiling`] if the ledger refuses the price,
    /// plus the errors of [`Self::create_event`].
    pub async fn list_ticket_for_resale(
        &self,
        signer: &Arc<dyn Signer>,
        event_id: EventId,
        ticket_id: &TicketId,
        price: Price,
    ) -> GatewayResult<TransactionReceipt> {
        let call = ContractCall::ListTicketForResale {
            event_id,
            ticket_id: ticket_id.clone(),
            price: to_wei(price),
        };
        self.transact(signer, call, Wei::ZERO).await
    }

    /// `delistTicket(eventId, ticketId)`.
    ///
    /// # Errors
    ///
    /// See [`Self::create_event`].
    pub async fn delist_ticket(
        &self,
        signer: &Arc<dyn Signer>,
        event_id: EventId,
        ticket_id: &TicketId,
    ) -> GatewayResult<TransactionReceipt> {
        let call = ContractCall::DelistTicket { event_id, ticket_id: ticket_id.clone() };
        self.transact(signer, call, Wei::ZERO).await
    }

    /// `purchaseResaleTicket(eventId, ticketId, seller)` paying `price`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InsufficientPayment`] if `price` is not the listing
    /// price, plus the errors of [`Self::create_event`].
    pub async fn purchase_resale_ticket(
        &self,
        signer: &Arc<dyn Signer>,
        event_id: EventId,
        ticket_id: &TicketId,
        seller: &Address,
        price: Price,
    ) -> GatewayResult<TransactionReceipt> {
        let call = ContractCall::PurchaseResaleTicket {
            event_id,
            ticket_id: ticket_id.clone(),
            seller: seller.clone(),
        };
        self.transact(signer, call, to_wei(price)).await
    }

    /// `verifyMyTicket(eventId, ticketId)`.
    ///
    /// # Errors
    ///
    /// See [`Self::create_event`].
    pub async fn verify_ticket(
        &self,
        signer: &Arc<dyn Signer>,
        event_id: EventId,
        ticket_id: &TicketId,
    ) -> GatewayResult<TransactionReceipt> {
        let call = ContractCall::VerifyTicket { event_id, ticket_id: ticket_id.clone() };
        self.transact(signer, call, Wei::ZERO).await
    }

    /// Reads an event. `Ok(None)` if the contract does not know it.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Transport`] on network failure.
    pub async fn get_event_details(&self, event_id: EventId) -> GatewayResult<Option<EventDetails>> {
        let snapshot = self
            .rpc
            .event(self.contract.clone(), event_id)
            .await
            .map_err(read_error)?;
        Ok(snapshot.map(EventDetails::from))
    }

    /// Reads a ticket. `Ok(None)` if the contract does not know it.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Transport`] on network failure.
    pub async fn get_ticket_details(
        &self,
        event_id: EventId,
        ticket_id: &TicketId,
    ) -> GatewayResult<Option<TicketDetails>> {
        let snapshot = self
            .rpc
            .ticket(self.contract.clone(), event_id, ticket_id.clone())
            .await
            .map_err(read_error)?;
        Ok(snapshot.map(TicketDetails::from))
    }

    /// Reads every ticket of `event_id` held by `owner`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Transport`] on network failure.
    pub async fn get_tickets_owned_by(
        &self,
        event_id: EventId,
        owner: &Address,
    ) -> GatewayResult<Vec<TicketDetails>> {
        let snapshots = self
            .rpc
            .tickets_owned_by(self.contract.clone(), event_id, owner.clone())
            .await
            .map_err(read_error)?;
        Ok(snapshots.into_iter().map(TicketDetails::from).collect())
    }

    /// Submit as `signer`, then wait for the receipt.
    async fn transact(
        &self,
        signer: &Arc<dyn Signer>,
        call: ContractCall,
        value: Wei,
    ) -> GatewayResult<TransactionReceipt> {
        let method = call.method_name();
        let request = TransactionRequest { to: self.contract.clone(), call, value };

        let submitted = timeout(self.submission_timeout, self.rpc.send_transaction(Arc::clone(signer), request)).await;
        let pending = match submitted {
            Ok(Ok(pending)) => pending,
            Ok(Err(RpcError::Rejected(reason))) => {
                tracing::warn!(method, reason = %reason, "Transaction rejected at submission");
                return Err(GatewayError::from_revert(reason));
            }
            Ok(Err(RpcError::Transport(message))) => {
                tracing::warn!(method, error = %message, "Transaction not submitted");
                return Err(GatewayError::Transport(message));
            }
            Ok(Err(RpcError::UnknownTransaction(hash))) => {
                return Err(GatewayError::Transport(format!("node lost transaction {hash} during submission")));
            }
            Err(_) => {
                tracing::warn!(
                    method,
                    waited_ms = self.submission_timeout.as_millis(),
                    "Submission not acknowledged in time"
                );
                return Err(GatewayError::Timeout { tx_hash: None, waited: self.submission_timeout });
            }
        };

        let tx_hash = pending.tx_hash;
        tracing::debug!(method, tx_hash = %tx_hash, "Transaction submitted");

        let started = Instant::now();
        let receipt = match timeout(self.confirmation_timeout, self.rpc.wait_for_receipt(tx_hash)).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(err)) => {
                tracing::warn!(method, tx_hash = %tx_hash, error = %err, "Lost track of submitted transaction");
                return Err(GatewayError::Timeout { tx_hash: Some(tx_hash), waited: started.elapsed() });
            }
            Err(_) => {
                tracing::warn!(
                    method,
                    tx_hash = %tx_hash,
                    waited_ms = self.confirmation_timeout.as_millis(),
                    "Confirmation not observed in time"
                );
                return Err(GatewayError::Timeout { tx_hash: Some(tx_hash), waited: self.confirmation_timeout });
            }
        };
        metrics::record_confirmation(started.elapsed());

        match receipt.status {
            ReceiptStatus::Success => {
                tracing::debug!(method, tx_hash = %tx_hash, block = receipt.block_number, "Transaction confirmed");
                Ok(receipt)
            }
            ReceiptStatus::Reverted(reason) => {
                tracing::warn!(method, tx_hash = %tx_hash, reason = %reason, "Transaction reverted");
                Err(GatewayError::from_revert(reason))
            }
        }
    }
}

fn read_error(err: RpcError) -> GatewayError {
    match err {
        RpcError::Rejected(reason) => GatewayError::RemoteRejected(reason),
        RpcError::Transport(message) => GatewayError::Transport(message),
        RpcError::UnknownTransaction(hash) => GatewayError::Transport(format!("unexpected reference to {hash}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ticket_ledger_testing::{Fault, InMemoryLedger, LocalSigner};

    fn price(s: &str) -> Price {
        Price::parse(s).unwrap()
    }

    fn gateway_over(ledger: &Arc<InMemoryLedger>) -> ContractGateway {
        ContractGateway::new(
            Arc::clone(ledger) as Arc<dyn LedgerRpc>,
            ledger.contract().clone(),
            &RuntimeConfig::default()
                .with_submission_timeout(Duration::from_millis(200))
                .with_confirmation_timeout(Duration::from_millis(500)),
        )
    }

    #[tokio::test]
    async fn test_unbound_gateway_has_no_signer() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);

        assert_eq!(gateway.bound_signer().unwrap_err(), GatewayError::NotInitialized);
        assert!(gateway.signer_address().is_none());
    }

    #[tokio::test]
    async fn test_initialize_rebinds_signer() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);

        gateway.initialize(LocalSigner::shared("0xAAA"));
        let first = gateway.bound_signer().unwrap();
        gateway.initialize(LocalSigner::shared("0xBBB"));
        assert_eq!(gateway.signer_address(), Some(Address::new("0xbbb")));
        assert_eq!(*first.address(), Address::new("0xaaa"));
    }

    #[tokio::test]
    async fn test_submission_signs_with_the_signer_it_was_given() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);
        gateway.initialize(LocalSigner::shared("0xOrganizer"));
        let organizer = gateway.bound_signer().unwrap();

        gateway.initialize(LocalSigner::shared("0xIntruder"));
        let receipt = gateway.create_event(&organizer, "Test", 10, price("0.1"), price("0.15")).await.unwrap();
        let event_id = receipt.created_event().unwrap();
        assert_eq!(ledger.event_snapshot(event_id).unwrap().creator, Address::new("0xorganizer"));
    }

    #[tokio::test]
    async fn test_purchase_pays_unit_price_times_quantity() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);
        let organizer = LocalSigner::shared("0xOrganizer");

        let receipt = gateway.create_event(&organizer, "Test", 10, price("0.1"), price("0.15")).await.unwrap();
        let event_id = receipt.created_event().unwrap();

        let buyer = LocalSigner::shared("0xBuyer");
        let receipt = gateway.purchase_ticket(&buyer, event_id, 3, price("0.1")).await.unwrap();
        assert_eq!(receipt.minted_tickets().count(), 3);

        let last = ledger.calls().pop().unwrap();
        assert_eq!(last.value, Wei(300_000_000_000_000_000));

        let details = gateway.get_event_details(event_id).await.unwrap().unwrap();
        assert_eq!(details.available, 7);
        assert_eq!(details.max_resale_price, price("0.15"));
    }

    #[tokio::test]
    async fn test_wrong_payment_reports_insufficient_payment() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);
        let organizer = LocalSigner::shared("0xOrganizer");
        let event_id = gateway
            .create_event(&organizer, "Test", 10, price("0.1"), price("0.15"))
            .await
            .unwrap()
            .created_event()
            .unwrap();

        let err = gateway.purchase_ticket(&organizer, event_id, 2, price("0.05")).await.unwrap_err();
        assert!(matches!(err, GatewayError::InsufficientPayment { .. }));
    }

    #[tokio::test]
    async fn test_zero_quantity_never_reaches_ledger() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);
        let buyer = LocalSigner::shared("0xBuyer");

        let err = gateway.purchase_ticket(&buyer, EventId::new(1), 0, price("0.1")).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidParameters(_)));
        assert_eq!(ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ledger_ceiling_check_is_authoritative() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);
        let organizer = LocalSigner::shared("0xOrganizer");
        let event_id = gateway
            .create_event(&organizer, "Test", 10, price("0.1"), price("0.15"))
            .await
            .unwrap()
            .created_event()
            .unwrap();
        gateway.toggle_resale_window(&organizer, event_id).await.unwrap();
        let ticket_id = gateway
            .purchase_ticket(&organizer, event_id, 1, price("0.1"))
            .await
            .unwrap()
            .minted_tickets()
            .map(|(_, id)| id.clone())
            .next()
            .unwrap();

        let err = gateway
            .list_ticket_for_resale(&organizer, event_id, &ticket_id, price("0.2"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PriceExceedsCeiling { .. }));

        let converted = err.into_ticketing(RecordKey::Ticket(ticket_id));
        assert_eq!(
            converted,
            TicketingError::PriceExceedsCeiling { price: price("0.2"), ceiling: price("0.15") }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_receipt_times_out_with_hash() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);
        let organizer = LocalSigner::shared("0xOrganizer");
        ledger.inject(Fault::NeverConfirm { applied: false });

        let err = gateway.create_event(&organizer, "Test", 10, price("0.1"), price("0.15")).await.unwrap_err();
        assert!(err.is_unresolved());
        assert!(err.tx_hash().is_some());
        assert_eq!(
            err,
            GatewayError::Timeout { tx_hash: err.tx_hash(), waited: Duration::from_millis(500) }
        );
    }

    #[tokio::test]
    async fn test_transport_failure_means_nothing_submitted() {
        let ledger = InMemoryLedger::new().shared();
        let gateway = gateway_over(&ledger);
        let organizer = LocalSigner::shared("0xOrganizer");
        ledger.inject(Fault::TransportFailure);

        let err = gateway.create_event(&organizer, "Test", 10, price("0.1"), price("0.15")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert!(!err.is_unresolved());
        assert!(gateway.get_event_details(EventId::new(1)).await.unwrap().is_none());
    }

    #[test]
    fn test_already_verified_revert_maps_to_informational_error() {
        let ticket_id = TicketId::new("T-001");
        let err = GatewayError::RemoteRejected(RevertReason::AlreadyVerified { ticket_id: ticket_id.clone() });
        let converted = err.into_ticketing(RecordKey::Ticket(ticket_id.clone()));
        assert_eq!(converted, TicketingError::AlreadyVerified { ticket_id });
        assert!(converted.is_informational());
    }
}
