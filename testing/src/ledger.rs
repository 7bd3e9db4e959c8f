//! In-memory ticketing contract.
//!
//! [`InMemoryLedger`] implements [`LedgerRpc`] against a simulated contract
//! that enforces the same rules as the deployed one: exact payment, supply
//! caps, resale ceilings, holder-only listing, creator-only window toggling,
//! one verification per ticket. Transactions from different callers are
//! applied one at a time in submission order.
//!
//! Faults are queued with [`InMemoryLedger::inject`] and consumed by the next
//! submissions, one fault per submission.

use futures::future;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use ticket_ledger_core::ledger::{
    ContractCall, EventSnapshot, LedgerLog, LedgerRpc, PendingTransaction, ReceiptStatus, RevertReason,
    RpcError, RpcFuture, Signer, TicketSnapshot, TransactionReceipt, TransactionRequest, TxHash, Wei,
};
use ticket_ledger_core::types::{Address, Event, EventId, Ticket, TicketId};

/// Contract address the ledger answers to unless configured otherwise.
pub const DEFAULT_CONTRACT: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

/// A failure applied to the next submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The node refuses the transaction; nothing is applied
    RejectSubmission(RevertReason),
    /// Accepted, then reverted with `reason`; nothing is applied
    Revert(RevertReason),
    /// Network failure before the node saw the transaction
    TransportFailure,
    /// Accepted, but the receipt never arrives. With `applied` the state
    /// change still lands on the ledger.
    NeverConfirm {
        /// Whether the transaction executes
        applied: bool,
    },
}

#[derive(Debug)]
struct EventRecord {
    snapshot: EventSnapshot,
    gate: Option<Address>,
}

#[derive(Debug, Default)]
struct LedgerState {
    events: BTreeMap<EventId, EventRecord>,
    tickets: BTreeMap<TicketId, TicketSnapshot>,
    // `None` marks a transaction whose receipt never arrives
    receipts: HashMap<TxHash, Option<TransactionReceipt>>,
    calls: Vec<TransactionRequest>,
    faults: VecDeque<Fault>,
    failing_reads: u32,
    last_serial: u64,
    block_number: u64,
}

/// Simulated ticketing contract.
#[derive(Debug)]
pub struct InMemoryLedger {
    contract: Address,
    latency: Duration,
    state: Mutex<LedgerState>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    /// Creates an empty ledger at [`DEFAULT_CONTRACT`] with no latency
    #[must_use]
    pub fn new() -> Self {
        Self {
            contract: Address::new(DEFAULT_CONTRACT),
            latency: Duration::ZERO,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Answers to `contract` instead of the default address
    #[must_use]
    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = contract;
        self
    }

    /// Delays every RPC by `latency`
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Contract address
    #[must_use]
    pub const fn contract(&self) -> &Address {
        &self.contract
    }

    /// Queues a fault for the next submission
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Makes the next `count` reads fail with a transport error
    pub fn fail_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    /// Seeds an event as if it had been created on chain.
    ///
    /// The creator defaults to the zero address when the record has none.
    pub fn seed_event(&self, event: &Event) {
        let snapshot = EventSnapshot {
            event_id: event.id,
            name: event.name.clone(),
            creator: event.creator.clone().unwrap_or_else(|| Address::new("0x0")),
            price: Wei(event.price.units()),
            max_resale_price: Wei(event.max_resale_price.units()),
            max_supply: event.max_supply,
            available: event.available,
            resale_window_open: event.resale_window_open,
        };
        self.lock()
            .events
            .insert(event.id, EventRecord { snapshot, gate: event.gate_address.clone() });
    }

    /// Seeds a ticket as if it had been minted on chain.
    pub fn seed_ticket(&self, ticket: &Ticket) {
        let snapshot = TicketSnapshot {
            ticket_id: ticket.id.clone(),
            event_id: ticket.event_id,
            owner: ticket.owner.clone(),
            resale_active: ticket.resale_active,
            price: ticket.asking_price.filter(|_| ticket.resale_active).map(|p| Wei(p.units())),
            verified: ticket.verified,
        };
        let mut state = self.lock();
        if let Some(serial) = ticket.id.as_str().strip_prefix("T-").and_then(|n| n.parse::<u64>().ok()) {
            state.last_serial = state.last_serial.max(serial);
        }
        state.tickets.insert(ticket.id.clone(), snapshot);
    }

    /// Every submitted transaction, in order
    #[must_use]
    pub fn calls(&self) -> Vec<TransactionRequest> {
        self.lock().calls.clone()
    }

    /// Number of submitted transactions
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Current contract state of an event
    #[must_use]
    pub fn event_snapshot(&self, event_id: EventId) -> Option<EventSnapshot> {
        self.lock().events.get(&event_id).map(|record| record.snapshot.clone())
    }

    /// Current contract state of a ticket
    #[must_use]
    pub fn ticket_snapshot(&self, ticket_id: &TicketId) -> Option<TicketSnapshot> {
        self.lock().tickets.get(ticket_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn check_read(&self, contract: &Address) -> Result<bool, RpcError> {
        let mut state = self.lock();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(RpcError::Transport("connection reset by peer".into()));
        }
        Ok(*contract == self.contract)
    }

    fn submit(&self, caller: &Address, request: TransactionRequest) -> Result<PendingTransaction, RpcError> {
        let mut state = self.lock();
        state.calls.push(request.clone());

        let fault = match state.faults.pop_front() {
            Some(Fault::TransportFailure) => return Err(RpcError::Transport("connection refused".into())),
            Some(Fault::RejectSubmission(reason)) => return Err(RpcError::Rejected(reason)),
            other => other,
        };
        if request.to != self.contract {
            return Err(RpcError::Rejected(RevertReason::InvalidParameters(format!(
                "no contract at {}",
                request.to
            ))));
        }

        let tx_hash = TxHash::from_bytes(rand::random());
        state.block_number += 1;
        let block_number = state.block_number;

        let receipt = match fault {
            Some(Fault::Revert(reason)) => Some(reverted(tx_hash, block_number, reason)),
            Some(Fault::NeverConfirm { applied }) => {
                if applied {
                    let outcome = state.execute(caller, &request);
                    tracing::debug!(tx_hash = %tx_hash, ok = outcome.is_ok(), "Executed unconfirmed transaction");
                }
                None
            }
            _ => Some(match state.execute(caller, &request) {
                Ok(logs) => TransactionReceipt { tx_hash, block_number, status: ReceiptStatus::Success, logs },
                Err(reason) => reverted(tx_hash, block_number, reason),
            }),
        };

        state.receipts.insert(tx_hash, receipt);
        Ok(PendingTransaction { tx_hash })
    }
}

fn reverted(tx_hash: TxHash, block_number: u64, reason: RevertReason) -> TransactionReceipt {
    TransactionReceipt { tx_hash, block_number, status: ReceiptStatus::Reverted(reason), logs: Vec::new() }
}

impl LedgerState {
    fn event(&self, event_id: EventId) -> Result<&EventRecord, RevertReason> {
        self.events.get(&event_id).ok_or(RevertReason::UnknownEvent { event_id })
    }

    fn ticket_of(&self, event_id: EventId, ticket_id: &TicketId) -> Result<&TicketSnapshot, RevertReason> {
        self.tickets
            .get(ticket_id)
            .filter(|ticket| ticket.event_id == event_id)
            .ok_or_else(|| RevertReason::UnknownTicket { ticket_id: ticket_id.clone() })
    }

    fn ticket_mut(&mut self, ticket_id: &TicketId) -> Result<&mut TicketSnapshot, RevertReason> {
        self.tickets
            .get_mut(ticket_id)
            .ok_or_else(|| RevertReason::UnknownTicket { ticket_id: ticket_id.clone() })
    }

    fn event_mut(&mut self, event_id: EventId) -> Result<&mut EventSnapshot, RevertReason> {
        self.events
            .get_mut(&event_id)
            .map(|record| &mut record.snapshot)
            .ok_or(RevertReason::UnknownEvent { event_id })
    }

    /// Applies `request` atomically: either every effect lands or none does.
    fn execute(&mut self, caller: &Address, request: &TransactionRequest) -> Result<Vec<LedgerLog>, RevertReason> {
        match &request.call {
            ContractCall::CreateEvent { name, max_supply, price, max_resale_price } => {
                if name.trim().is_empty() || *max_supply == 0 {
                    return Err(RevertReason::InvalidParameters("empty name or zero supply".into()));
                }
                if max_resale_price < price {
                    return Err(RevertReason::InvalidParameters("resale ceiling below price".into()));
                }
                let event_id = self.events.keys().next_back().map_or(EventId::new(1), EventId::next);
                let snapshot = EventSnapshot {
                    event_id,
                    name: name.clone(),
                    creator: caller.clone(),
                    price: *price,
                    max_resale_price: *max_resale_price,
                    max_supply: *max_supply,
                    available: *max_supply,
                    resale_window_open: false,
                };
                self.events.insert(event_id, EventRecord { snapshot, gate: None });
                Ok(vec![LedgerLog::EventCreated { event_id, creator: caller.clone() }])
            }

            ContractCall::PurchaseTicket { event_id, amount } => {
                let event = &self.event(*event_id)?.snapshot;
                if *amount == 0 {
                    return Err(RevertReason::InvalidParameters("amount must be positive".into()));
                }
                let required = event
                    .price
                    .checked_mul(*amount)
                    .ok_or_else(|| RevertReason::InvalidParameters("payment overflow".into()))?;
                if request.value != required {
                    return Err(RevertReason::InsufficientPayment { required, offered: request.value });
                }
                if event.available < *amount {
                    return Err(RevertReason::SoldOut {
                        event_id: *event_id,
                        requested: *amount,
                        available: event.available,
                    });
                }

                self.event_mut(*event_id)?.available -= amount;
                let mut ticket_ids = SmallVec::<[TicketId; 4]>::new();
                for _ in 0..*amount {
                    self.last_serial += 1;
                    let ticket_id = TicketId::from_serial(self.last_serial);
                    self.tickets.insert(
                        ticket_id.clone(),
                        TicketSnapshot {
                            ticket_id: ticket_id.clone(),
                            event_id: *event_id,
                            owner: caller.clone(),
                            resale_active: false,
                            price: None,
                            verified: false,
                        },
                    );
                    ticket_ids.push(ticket_id);
                }
                Ok(vec![LedgerLog::TicketsMinted { event_id: *event_id, owner: caller.clone(), ticket_ids }])
            }

            ContractCall::ToggleResaleWindow { event_id } => {
                let event = self.event_mut(*event_id)?;
                if event.creator != *caller {
                    return Err(RevertReason::Unauthorized);
                }
                event.resale_window_open = !event.resale_window_open;
                let open = event.resale_window_open;
                Ok(vec![LedgerLog::ResaleWindowToggled { event_id: *event_id, open }])
            }

            ContractCall::ListTicketForResale { event_id, ticket_id, price } => {
                let event = &self.event(*event_id)?.snapshot;
                let (window_open, ceiling) = (event.resale_window_open, event.max_resale_price);
                let ticket = self.ticket_of(*event_id, ticket_id)?;
                if ticket.owner != *caller {
                    return Err(RevertReason::NotTicketOwner { ticket_id: ticket_id.clone() });
                }
                if ticket.verified {
                    return Err(RevertReason::AlreadyVerified { ticket_id: ticket_id.clone() });
                }
                if !window_open {
                    return Err(RevertReason::ResaleWindowClosed { event_id: *event_id });
                }
                if *price > ceiling {
                    return Err(RevertReason::PriceExceedsCeiling { price: *price, ceiling });
                }

                let ticket = self.ticket_mut(ticket_id)?;
                ticket.resale_active = true;
                ticket.price = Some(*price);
                Ok(vec![LedgerLog::TicketListed { event_id: *event_id, ticket_id: ticket_id.clone(), price: *price }])
            }

            ContractCall::DelistTicket { event_id, ticket_id } => {
                let ticket = self.ticket_of(*event_id, ticket_id)?;
                if ticket.owner != *caller {
                    return Err(RevertReason::NotTicketOwner { ticket_id: ticket_id.clone() });
                }
                if !ticket.resale_active {
                    return Err(RevertReason::NotListed { ticket_id: ticket_id.clone() });
                }

                let ticket = self.ticket_mut(ticket_id)?;
                ticket.resale_active = false;
                ticket.price = None;
                Ok(vec![LedgerLog::TicketDelisted { event_id: *event_id, ticket_id: ticket_id.clone() }])
            }

            ContractCall::PurchaseResaleTicket { event_id, ticket_id, seller } => {
                if !self.event(*event_id)?.snapshot.resale_window_open {
                    return Err(RevertReason::ResaleWindowClosed { event_id: *event_id });
                }
                let ticket = self.ticket_of(*event_id, ticket_id)?;
                if ticket.owner != *seller {
                    return Err(RevertReason::NotTicketOwner { ticket_id: ticket_id.clone() });
                }
                let price = match ticket.price {
                    Some(price) if ticket.resale_active => price,
                    _ => return Err(RevertReason::NotListed { ticket_id: ticket_id.clone() }),
                };
                if request.value != price {
                    return Err(RevertReason::InsufficientPayment { required: price, offered: request.value });
                }

                let ticket = self.ticket_mut(ticket_id)?;
                ticket.owner = caller.clone();
                ticket.resale_active = false;
                ticket.price = None;
                Ok(vec![LedgerLog::TicketResold {
                    event_id: *event_id,
                    ticket_id: ticket_id.clone(),
                    seller: seller.clone(),
                    buyer: caller.clone(),
                    price,
                }])
            }

            ContractCall::VerifyTicket { event_id, ticket_id } => {
                let record = self.event(*event_id)?;
                let gatekeeper = record.snapshot.creator == *caller || record.gate.as_ref() == Some(caller);
                let ticket = self.ticket_of(*event_id, ticket_id)?;
                if ticket.verified {
                    return Err(RevertReason::AlreadyVerified { ticket_id: ticket_id.clone() });
                }
                if ticket.owner != *caller && !gatekeeper {
                    return Err(RevertReason::Unauthorized);
                }

                let ticket = self.ticket_mut(ticket_id)?;
                ticket.verified = true;
                ticket.resale_active = false;
                ticket.price = None;
                Ok(vec![LedgerLog::TicketVerified { event_id: *event_id, ticket_id: ticket_id.clone() }])
            }
        }
    }
}

impl LedgerRpc for InMemoryLedger {
    fn send_transaction(
        &self,
        signer: Arc<dyn Signer>,
        request: TransactionRequest,
    ) -> RpcFuture<'_, PendingTransaction> {
        Box::pin(async move {
            self.simulate_latency().await;
            self.submit(signer.address(), request)
        })
    }

    fn wait_for_receipt(&self, tx_hash: TxHash) -> RpcFuture<'_, TransactionReceipt> {
        Box::pin(async move {
            self.simulate_latency().await;
            let receipt = self.lock().receipts.get(&tx_hash).cloned();
            match receipt {
                Some(Some(receipt)) => Ok(receipt),
                Some(None) => future::pending().await,
                None => Err(RpcError::UnknownTransaction(tx_hash)),
            }
        })
    }

    fn event(&self, contract: Address, event_id: EventId) -> RpcFuture<'_, Option<EventSnapshot>> {
        Box::pin(async move {
            self.simulate_latency().await;
            if !self.check_read(&contract)? {
                return Ok(None);
            }
            Ok(self.event_snapshot(event_id))
        })
    }

    fn ticket(
        &self,
        contract: Address,
        event_id: EventId,
        ticket_id: TicketId,
    ) -> RpcFuture<'_, Option<TicketSnapshot>> {
        Box::pin(async move {
            self.simulate_latency().await;
            if !self.check_read(&contract)? {
                return Ok(None);
            }
            Ok(self.ticket_snapshot(&ticket_id).filter(|ticket| ticket.event_id == event_id))
        })
    }

    fn tickets_owned_by(
        &self,
        contract: Address,
        event_id: EventId,
        owner: Address,
    ) -> RpcFuture<'_, Vec<TicketSnapshot>> {
        Box::pin(async move {
            self.simulate_latency().await;
            if !self.check_read(&contract)? {
                return Ok(Vec::new());
            }
            Ok(self
                .lock()
                .tickets
                .values()
                .filter(|ticket| ticket.event_id == event_id && ticket.owner == owner)
                .cloned()
                .collect())
        })
    }
}
