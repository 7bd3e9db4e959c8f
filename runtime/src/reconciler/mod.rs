//! Consistency reconciler - the two-phase protocol over catalog, registry and ledger.
//!
//! Every operation runs the same four steps:
//!
//! 1. **Pre-check** against local state. Failures return immediately and the
//!    gateway is never called.
//! 2. **Optimistic mutation** of the catalog or registry, marking the record
//!    [`SyncState::Pending`] with the operation needed to undo it.
//! 3. **Submission** through the [`ContractGateway`]. No lock is held while
//!    waiting.
//! 4. **Settlement**: a confirmed receipt makes the mutation final, a revert
//!    rolls it back exactly, and a timeout quarantines the record as
//!    [`SyncState::Unknown`] until [`Reconciler::reconcile_event`] or
//!    [`Reconciler::reconcile_ticket`] resolves it from a ledger read.
//!
//! A record that is not `Synced` rejects new operations with
//! [`TicketingError::ConflictPending`], so each record has at most one
//! transaction in flight.
//!
//! # Locking
//!
//! The catalog and registry sit behind separate `RwLock`s, always acquired in
//! catalog-then-registry order, and never held across a gateway call.
//!
//! # Caller identity
//!
//! The acting wallet is the signer bound to the gateway, taken once when an
//! operation starts. The same signer records the local owner, buyer or
//! creator and signs the submission, so rebinding the gateway mid-operation
//! only affects later operations. Operations fail with
//! [`TicketingError::NotInitialized`] until a signer is bound.
//!
//! # Event ids
//!
//! A created event gets a provisional local id and moves to the id the ledger
//! assigns once that is known. Creations through one reconciler are
//! serialized so at most one provisional id is in flight.

mod resolve;

pub use resolve::{ReconciliationReport, Resolution};

use crate::config::RuntimeConfig;
use crate::gateway::{ContractGateway, GatewayError, GatewayResult};
use crate::metrics::{self, Outcome};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use ticket_ledger_core::catalog::EventCatalog;
use ticket_ledger_core::environment::Clock;
use ticket_ledger_core::error::TicketingError;
use ticket_ledger_core::ledger::{Signer, TransactionReceipt};
use ticket_ledger_core::registry::TicketRegistry;
use ticket_ledger_core::sync::{EventOp, RecordKey, SyncState, TicketOp};
use ticket_ledger_core::types::{Address, Event, EventId, EventSpec, Price, ResaleState, Ticket, TicketId};
use tokio::sync::{Mutex, RwLock};

/// Result of a confirmed primary purchase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimaryPurchase {
    /// Event after the sale
    pub event: Event,
    /// Tickets minted to the buyer
    pub tickets: Vec<Ticket>,
}

/// Orchestrates user operations across the registries and the gateway.
pub struct Reconciler {
    gateway: Arc<ContractGateway>,
    catalog: RwLock<EventCatalog>,
    tickets: RwLock<TicketRegistry>,
    // taken before the catalog lock
    creating: Mutex<()>,
    clock: Arc<dyn Clock>,
    read_retry: RetryPolicy,
}

impl Reconciler {
    /// Creates a reconciler owning `catalog` and `tickets`.
    #[must_use]
    pub fn new(
        gateway: Arc<ContractGateway>,
        catalog: EventCatalog,
        tickets: TicketRegistry,
        clock: Arc<dyn Clock>,
        config: &RuntimeConfig,
    ) -> Self {
        Self {
            gateway,
            catalog: RwLock::new(catalog),
            tickets: RwLock::new(tickets),
            creating: Mutex::new(()),
            clock,
            read_retry: config.read_retry.clone(),
        }
    }

    /// The gateway this reconciler submits through
    #[must_use]
    pub const fn gateway(&self) -> &Arc<ContractGateway> {
        &self.gateway
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Creates an event with the bound signer as creator.
    ///
    /// The record is inserted before submission. A revert removes it again; a
    /// confirmation moves it to the id the ledger assigned if they differ.
    ///
    /// # Errors
    ///
    /// [`TicketingError::NotInitialized`], [`TicketingError::InvalidParameters`]
    /// for a spec that fails validation, [`TicketingError::RemoteRejected`],
    /// [`TicketingError::Timeout`], [`TicketingError::Transport`], and
    /// [`TicketingError::ConflictPending`] if the ledger confirmed an id that a
    /// settled local record already holds (the new record is quarantined).
    pub async fn create_event(&self, spec: EventSpec) -> Result<Event, TicketingError> {
        let result = self.create_event_inner(spec).await;
        observe(EventOp::Creation.label(), &result);
        result
    }

    async fn create_event_inner(&self, spec: EventSpec) -> Result<Event, TicketingError> {
        let signer = self.signer()?;
        let creator = signer.address().clone();
        spec.validate()?;

        let _creating = self.creating.lock().await;

        let local_id = {
            let mut catalog = self.catalog.write().await;
            let id = catalog.create(spec.clone())?.id;
            catalog.set_creator(id, creator.clone())?;
            catalog.set_sync(id, self.pending(EventOp::Creation))?;
            id
        };

        let outcome = self
            .gateway
            .create_event(&signer, &spec.name, spec.max_supply, spec.price, spec.max_resale_price)
            .await;

        let mut catalog = self.catalog.write().await;
        match outcome {
            Ok(receipt) => {
                let id = match receipt.created_event() {
                    Some(assigned) => {
                        if let Err(err) = claim_ledger_id(&mut catalog, local_id, assigned) {
                            tracing::error!(
                                local = %local_id,
                                ledger = %assigned,
                                error = %err,
                                "Ledger-assigned event id is held by another local record"
                            );
                            catalog.set_sync(
                                local_id,
                                SyncState::Unknown {
                                    op: EventOp::Creation,
                                    since: self.clock.now(),
                                    tx_hash: Some(receipt.tx_hash),
                                },
                            )?;
                            metrics::record_quarantined();
                            return Err(TicketingError::ConflictPending { record: RecordKey::Event(local_id) });
                        }
                        assigned
                    }
                    None => {
                        tracing::warn!(event_id = %local_id, "Creation receipt carries no EventCreated log");
                        local_id
                    }
                };
                catalog.set_sync(id, SyncState::Synced)?;
                metrics::record_event_created();
                tracing::info!(event_id = %id, creator = %creator, name = %spec.name, "Event created");
                catalog.get(id).cloned().ok_or_else(|| TicketingError::unknown_event(id))
            }
            Err(err) if err.is_unresolved() => {
                self.quarantine_event(&mut catalog, local_id, EventOp::Creation, &err)?;
                Err(err.into_ticketing(RecordKey::Event(local_id)))
            }
            Err(err) => {
                rollback_event(&mut catalog, local_id, &EventOp::Creation)?;
                tracing::warn!(event_id = %local_id, error = %err, "Event creation rejected; record removed");
                Err(err.into_ticketing(RecordKey::Event(local_id)))
            }
        }
    }

    /// Buys `quantity` tickets of `event_id` at the event price.
    ///
    /// Supply is deducted before submission and restored on revert. Tickets
    /// are minted locally from the ids in the confirmed receipt.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for a zero quantity or unknown
    /// event, [`TicketingError::InsufficientSupply`],
    /// [`TicketingError::ConflictPending`], plus the ledger failures of
    /// [`Self::create_event`].
    pub async fn buy_primary(&self, event_id: EventId, quantity: u32) -> Result<PrimaryPurchase, TicketingError> {
        let result = self.buy_primary_inner(event_id, quantity).await;
        observe("buy_primary", &result);
        result
    }

    async fn buy_primary_inner(&self, event_id: EventId, quantity: u32) -> Result<PrimaryPurchase, TicketingError> {
        let signer = self.signer()?;
        let buyer = signer.address().clone();
        if quantity == 0 {
            return Err(TicketingError::invalid("quantity must be greater than zero"));
        }

        let op = EventOp::PrimarySale { quantity, buyer: buyer.clone() };
        let unit_price = {
            let mut catalog = self.catalog.write().await;
            let event = catalog.get(event_id).ok_or_else(|| TicketingError::unknown_event(event_id))?;
            ensure_event_idle(event)?;
            let price = event.price;
            catalog.decrement_available(event_id, quantity)?;
            catalog.set_sync(event_id, self.pending(op.clone()))?;
            price
        };

        let outcome = self.gateway.purchase_ticket(&signer, event_id, quantity, unit_price).await;

        let mut catalog = self.catalog.write().await;
        match outcome {
            Ok(receipt) => {
                catalog.set_sync(event_id, SyncState::Synced)?;
                let minted = {
                    let mut tickets = self.tickets.write().await;
                    mint_from_receipt(&mut tickets, event_id, &receipt)
                };
                if minted.len() != quantity as usize {
                    tracing::warn!(
                        event_id = %event_id,
                        requested = quantity,
                        minted = minted.len(),
                        "Receipt minted a different number of tickets than requested"
                    );
                }
                metrics::record_tickets_minted(minted.len());
                let event = catalog.get(event_id).cloned().ok_or_else(|| TicketingError::unknown_event(event_id))?;
                tracing::info!(
                    event_id = %event_id,
                    buyer = %buyer,
                    quantity,
                    available = event.available,
                    tx_hash = %receipt.tx_hash,
                    "Primary sale confirmed"
                );
                Ok(PrimaryPurchase { event, tickets: minted })
            }
            Err(err) if err.is_unresolved() => {
                self.quarantine_event(&mut catalog, event_id, op, &err)?;
                Err(err.into_ticketing(RecordKey::Event(event_id)))
            }
            Err(err) => {
                rollback_event(&mut catalog, event_id, &op)?;
                catalog.set_sync(event_id, SyncState::Synced)?;
                tracing::warn!(event_id = %event_id, quantity, error = %err, "Primary sale rejected; supply restored");
                Err(err.into_ticketing(RecordKey::Event(event_id)))
            }
        }
    }

    /// Opens or closes the event's resale window. Creator only.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] if the caller is not the creator,
    /// [`TicketingError::ConflictPending`], plus the ledger failures of
    /// [`Self::create_event`].
    pub async fn toggle_resale_window(&self, event_id: EventId) -> Result<Event, TicketingError> {
        let result = self.toggle_resale_window_inner(event_id).await;
        observe("toggle_resale_window", &result);
        result
    }

    async fn toggle_resale_window_inner(&self, event_id: EventId) -> Result<Event, TicketingError> {
        let signer = self.signer()?;
        let caller = signer.address().clone();

        let previous = {
            let mut catalog = self.catalog.write().await;
            let event = catalog.get(event_id).ok_or_else(|| TicketingError::unknown_event(event_id))?;
            ensure_event_idle(event)?;
            if event.creator.as_ref() != Some(&caller) {
                return Err(TicketingError::invalid(format!(
                    "only the creator of event {event_id} may toggle its resale window"
                )));
            }
            let previous = event.resale_window_open;
            catalog.set_resale_window(event_id, !previous)?;
            catalog.set_sync(event_id, self.pending(EventOp::ResaleWindowToggle { previous }))?;
            previous
        };

        let outcome = self.gateway.toggle_resale_window(&signer, event_id).await;

        let mut catalog = self.catalog.write().await;
        match outcome {
            Ok(_) => {
                catalog.set_sync(event_id, SyncState::Synced)?;
                tracing::info!(event_id = %event_id, open = !previous, "Resale window toggled");
                catalog.get(event_id).cloned().ok_or_else(|| TicketingError::unknown_event(event_id))
            }
            Err(err) if err.is_unresolved() => {
                self.quarantine_event(&mut catalog, event_id, EventOp::ResaleWindowToggle { previous }, &err)?;
                Err(err.into_ticketing(RecordKey::Event(event_id)))
            }
            Err(err) => {
                rollback_event(&mut catalog, event_id, &EventOp::ResaleWindowToggle { previous })?;
                catalog.set_sync(event_id, SyncState::Synced)?;
                tracing::warn!(event_id = %event_id, error = %err, "Resale window toggle rejected; restored");
                Err(err.into_ticketing(RecordKey::Event(event_id)))
            }
        }
    }

    /// Flips the holder's resale flag.
    ///
    /// Activating lists the ticket at its last asking price, or the event
    /// price if it was never listed. Deactivating delists it.
    ///
    /// # Errors
    ///
    /// [`TicketingError::TicketVerified`] when activating a verified ticket,
    /// [`TicketingError::InvalidParameters`] if the caller is not the holder
    /// or the resale window is closed, [`TicketingError::ConflictPending`],
    /// plus the ledger failures of [`Self::create_event`].
    pub async fn toggle_resale(&self, ticket_id: &TicketId) -> Result<Ticket, TicketingError> {
        let result = self.toggle_resale_inner(ticket_id).await;
        observe("toggle_resale", &result);
        result
    }

    async fn toggle_resale_inner(&self, ticket_id: &TicketId) -> Result<Ticket, TicketingError> {
        let signer = self.signer()?;
        let caller = signer.address().clone();

        let (event_id, activate, price, op) = {
            let catalog = self.catalog.read().await;
            let mut tickets = self.tickets.write().await;
            let (event, ticket) = lookup(&catalog, &tickets, ticket_id)?;
            ensure_ticket_idle(ticket)?;
            ensure_holder(ticket, &caller)?;

            let activate = !ticket.resale_active;
            if activate {
                if ticket.verified {
                    return Err(TicketingError::TicketVerified { ticket_id: ticket_id.clone() });
                }
                ensure_window_open(event)?;
            }
            let price = ticket.asking_price.unwrap_or(event.price);
            let op = TicketOp::ResaleToggle {
                previous_active: ticket.resale_active,
                previous_price: ticket.asking_price,
            };
            let event_id = event.id;

            tickets.set_resale_active(ticket_id, activate)?;
            if activate {
                tickets.set_asking_price(ticket_id, Some(price))?;
            }
            tickets.set_sync(ticket_id, self.pending(op.clone()))?;
            (event_id, activate, price, op)
        };

        let outcome = if activate {
            self.gateway.list_ticket_for_resale(&signer, event_id, ticket_id, price).await
        } else {
            self.gateway.delist_ticket(&signer, event_id, ticket_id).await
        };
        self.settle_ticket(ticket_id, op, outcome).await
    }

    /// Lists the ticket for resale at `price`.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] if `price` is zero or above the
    /// event's resale ceiling (checked before any remote call), the caller is
    /// not the holder, or the window is closed;
    /// [`TicketingError::TicketVerified`]; [`TicketingError::ConflictPending`];
    /// plus the ledger failures of [`Self::create_event`].
    pub async fn list_resale(&self, ticket_id: &TicketId, price: Price) -> Result<Ticket, TicketingError> {
        let result = self.list_resale_inner(ticket_id, price).await;
        observe("list_resale", &result);
        result
    }

    async fn list_resale_inner(&self, ticket_id: &TicketId, price: Price) -> Result<Ticket, TicketingError> {
        let signer = self.signer()?;
        let caller = signer.address().clone();

        let (event_id, op) = {
            let catalog = self.catalog.read().await;
            let mut tickets = self.tickets.write().await;
            let (event, ticket) = lookup(&catalog, &tickets, ticket_id)?;
            ensure_ticket_idle(ticket)?;
            ensure_holder(ticket, &caller)?;
            if ticket.verified {
                return Err(TicketingError::TicketVerified { ticket_id: ticket_id.clone() });
            }
            ensure_window_open(event)?;
            if price.is_zero() {
                return Err(TicketingError::invalid("resale price must be greater than zero"));
            }
            if price > event.max_resale_price {
                return Err(TicketingError::invalid(format!(
                    "resale price {price} exceeds the ceiling {} for event {}",
                    event.max_resale_price, event.id
                )));
            }

            let op = TicketOp::ResaleListing {
                previous_active: ticket.resale_active,
                previous_price: ticket.asking_price,
            };
            let event_id = event.id;
            tickets.set_resale_active(ticket_id, true)?;
            tickets.set_asking_price(ticket_id, Some(price))?;
            tickets.set_sync(ticket_id, self.pending(op.clone()))?;
            (event_id, op)
        };

        let outcome = self.gateway.list_ticket_for_resale(&signer, event_id, ticket_id, price).await;
        self.settle_ticket(ticket_id, op, outcome).await
    }

    /// Buys a ticket listed for resale, paying its asking price.
    ///
    /// Ownership moves to the caller before submission. Concurrent buyers of
    /// the same ticket are serialized: a second operation through this
    /// reconciler gets [`TicketingError::ConflictPending`], and a buyer
    /// elsewhere loses at the ledger and is rolled back.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] if the ticket is not listed, the
    /// caller already holds it, or the window is closed;
    /// [`TicketingError::ConflictPending`]; plus the ledger failures of
    /// [`Self::create_event`].
    pub async fn buy_resale(&self, ticket_id: &TicketId) -> Result<Ticket, TicketingError> {
        let result = self.buy_resale_inner(ticket_id).await;
        observe("buy_resale", &result);
        result
    }

    async fn buy_resale_inner(&self, ticket_id: &TicketId) -> Result<Ticket, TicketingError> {
        let signer = self.signer()?;
        let buyer = signer.address().clone();

        let (event_id, seller, price, op) = {
            let catalog = self.catalog.read().await;
            let mut tickets = self.tickets.write().await;
            let (event, ticket) = lookup(&catalog, &tickets, ticket_id)?;
            ensure_ticket_idle(ticket)?;
            if ticket.verified {
                return Err(TicketingError::TicketVerified { ticket_id: ticket_id.clone() });
            }
            let price = match ticket.asking_price {
                Some(price) if ticket.resale_active => price,
                _ => {
                    return Err(TicketingError::invalid(format!("ticket {ticket_id} is not offered for resale")));
                }
            };
            if ticket.owner == buyer {
                return Err(TicketingError::invalid(format!("ticket {ticket_id} is already held by the buyer")));
            }
            ensure_window_open(event)?;

            let seller = ticket.owner.clone();
            let op = TicketOp::ResalePurchase {
                previous_owner: seller.clone(),
                buyer: buyer.clone(),
                previous_price: ticket.asking_price,
            };
            let event_id = event.id;
            tickets.transfer(ticket_id, buyer.clone())?;
            tickets.set_resale_active(ticket_id, false)?;
            tickets.set_asking_price(ticket_id, None)?;
            tickets.set_sync(ticket_id, self.pending(op.clone()))?;
            (event_id, seller, price, op)
        };

        let outcome = self
            .gateway
            .purchase_resale_ticket(&signer, event_id, ticket_id, &seller, price)
            .await;
        self.settle_ticket(ticket_id, op, outcome).await
    }

    /// Redeems a ticket at the gate.
    ///
    /// Allowed for the holder, the event creator and the event's gate
    /// address. The verified flag is only set once the ledger confirms; the
    /// resale flag is cleared optimistically.
    ///
    /// # Errors
    ///
    /// [`TicketingError::AlreadyVerified`] for a ticket verified before (no
    /// remote call, no field changes), [`TicketingError::InvalidParameters`]
    /// if the caller may not verify, [`TicketingError::ConflictPending`], plus
    /// the ledger failures of [`Self::create_event`].
    pub async fn verify(&self, ticket_id: &TicketId) -> Result<Ticket, TicketingError> {
        let result = self.verify_inner(ticket_id).await;
        observe("verify", &result);
        result
    }

    async fn verify_inner(&self, ticket_id: &TicketId) -> Result<Ticket, TicketingError> {
        let signer = self.signer()?;
        let caller = signer.address().clone();

        let (event_id, op) = {
            let catalog = self.catalog.read().await;
            let mut tickets = self.tickets.write().await;
            let (event, ticket) = lookup(&catalog, &tickets, ticket_id)?;
            ensure_ticket_idle(ticket)?;
            if ticket.verified {
                tracing::info!(ticket_id = %ticket_id, caller = %caller, "Duplicate verification attempt");
                return Err(TicketingError::AlreadyVerified { ticket_id: ticket_id.clone() });
            }
            if ticket.owner != caller && !event.is_gatekeeper(&caller) {
                return Err(TicketingError::invalid(format!(
                    "only the holder or a gatekeeper of event {} may verify ticket {ticket_id}",
                    event.id
                )));
            }

            let op = TicketOp::Verification { previous_active: ticket.resale_active };
            let event_id = event.id;
            tickets.set_resale_active(ticket_id, false)?;
            tickets.set_sync(ticket_id, self.pending(op.clone()))?;
            (event_id, op)
        };

        let outcome = self.gateway.verify_ticket(&signer, event_id, ticket_id).await;
        self.settle_ticket(ticket_id, op, outcome).await
    }

    // ========================================================================
    // Read accessors
    // ========================================================================

    /// Looks up an event
    pub async fn event(&self, event_id: EventId) -> Option<Event> {
        self.catalog.read().await.get(event_id).cloned()
    }

    /// All events in id order
    pub async fn events(&self) -> Vec<Event> {
        self.catalog.read().await.events().cloned().collect()
    }

    /// Events created by `address`; empty when no address is given
    pub async fn hosted_events(&self, address: Option<&Address>) -> Vec<Event> {
        self.catalog
            .read()
            .await
            .list_by_creator(address)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Looks up a ticket
    pub async fn ticket(&self, ticket_id: &TicketId) -> Option<Ticket> {
        self.tickets.read().await.get(ticket_id).cloned()
    }

    /// Tickets held by `owner`
    pub async fn tickets_of(&self, owner: &Address) -> Vec<Ticket> {
        self.tickets
            .read()
            .await
            .tickets_of(owner)
            .into_iter()
            .cloned()
            .collect()
    }

    /// `true` only for a known, listed ticket whose state is not quarantined
    pub async fn is_resale_active(&self, ticket_id: &TicketId) -> bool {
        self.tickets.read().await.is_resale_active(ticket_id)
    }

    /// `true` only for a known, verified ticket
    pub async fn is_ticket_verified(&self, ticket_id: &TicketId) -> bool {
        self.tickets.read().await.is_verified(ticket_id)
    }

    /// Resale flag including the quarantined sub-state
    pub async fn resale_state(&self, ticket_id: &TicketId) -> Option<ResaleState> {
        self.tickets.read().await.get(ticket_id).map(Ticket::resale_state)
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    fn signer(&self) -> Result<Arc<dyn Signer>, TicketingError> {
        self.gateway.bound_signer().map_err(|_| TicketingError::NotInitialized)
    }

    fn pending<Op>(&self, op: Op) -> SyncState<Op> {
        SyncState::Pending { op, since: self.clock.now() }
    }

    fn quarantine_event(
        &self,
        catalog: &mut EventCatalog,
        event_id: EventId,
        op: EventOp,
        err: &GatewayError,
    ) -> Result<(), TicketingError> {
        tracing::warn!(
            event_id = %event_id,
            operation = op.label(),
            tx_hash = ?err.tx_hash(),
            "Event quarantined: outcome unknown until reconciled"
        );
        catalog.set_sync(
            event_id,
            SyncState::Unknown { op, since: self.clock.now(), tx_hash: err.tx_hash() },
        )?;
        metrics::record_quarantined();
        Ok(())
    }

    /// Commit, roll back or quarantine a ticket operation.
    async fn settle_ticket(
        &self,
        ticket_id: &TicketId,
        op: TicketOp,
        outcome: GatewayResult<TransactionReceipt>,
    ) -> Result<Ticket, TicketingError> {
        let record = RecordKey::Ticket(ticket_id.clone());
        let mut tickets = self.tickets.write().await;

        match outcome {
            Ok(receipt) => {
                finalize_ticket(&mut tickets, ticket_id, &op)?;
                tickets.set_sync(ticket_id, SyncState::Synced)?;
                tracing::info!(
                    ticket_id = %ticket_id,
                    operation = op.label(),
                    tx_hash = %receipt.tx_hash,
                    "Ticket operation confirmed"
                );
            }
            Err(err) if err.is_unresolved() => {
                tracing::warn!(
                    ticket_id = %ticket_id,
                    operation = op.label(),
                    tx_hash = ?err.tx_hash(),
                    "Ticket quarantined: outcome unknown until reconciled"
                );
                let tx_hash = err.tx_hash();
                tickets.set_sync(ticket_id, SyncState::Unknown { op, since: self.clock.now(), tx_hash })?;
                metrics::record_quarantined();
                return Err(err.into_ticketing(record));
            }
            Err(err) => {
                rollback_ticket(&mut tickets, ticket_id, &op)?;
                let err = err.into_ticketing(record);
                if let TicketingError::AlreadyVerified { .. } = err {
                    // the ledger knows better: the ticket was redeemed elsewhere
                    tickets.set_verified(ticket_id)?;
                    tracing::info!(ticket_id = %ticket_id, "Ticket already verified on the ledger");
                } else {
                    tracing::warn!(
                        ticket_id = %ticket_id,
                        operation = op.label(),
                        error = %err,
                        "Ticket operation rejected; rolled back"
                    );
                }
                tickets.set_sync(ticket_id, SyncState::Synced)?;
                return Err(err);
            }
        }

        tickets.get(ticket_id).cloned().ok_or_else(|| TicketingError::unknown_ticket(ticket_id))
    }
}

/// Counts the operation outcome and logs pre-check failures.
fn observe<T>(operation: &'static str, result: &Result<T, TicketingError>) {
    let outcome = match result {
        Ok(_) => Outcome::Confirmed,
        Err(err) => Outcome::of_error(err),
    };
    if let (Outcome::Rejected | Outcome::Conflict, Err(err)) = (outcome, result) {
        tracing::debug!(operation, error = %err, "Operation rejected before submission");
    }
    metrics::record_operation(operation, outcome);
}

fn lookup<'a>(
    catalog: &'a EventCatalog,
    tickets: &'a TicketRegistry,
    ticket_id: &TicketId,
) -> Result<(&'a Event, &'a Ticket), TicketingError> {
    let ticket = tickets.get(ticket_id).ok_or_else(|| TicketingError::unknown_ticket(ticket_id))?;
    let event = catalog
        .get(ticket.event_id)
        .ok_or_else(|| TicketingError::unknown_event(ticket.event_id))?;
    Ok((event, ticket))
}

fn ensure_event_idle(event: &Event) -> Result<(), TicketingError> {
    if event.sync.is_synced() {
        Ok(())
    } else {
        Err(TicketingError::ConflictPending { record: RecordKey::Event(event.id) })
    }
}

fn ensure_ticket_idle(ticket: &Ticket) -> Result<(), TicketingError> {
    if ticket.sync.is_synced() {
        Ok(())
    } else {
        Err(TicketingError::ConflictPending { record: RecordKey::Ticket(ticket.id.clone()) })
    }
}

fn ensure_holder(ticket: &Ticket, caller: &Address) -> Result<(), TicketingError> {
    if ticket.owner == *caller {
        Ok(())
    } else {
        Err(TicketingError::invalid(format!("ticket {} is not held by {caller}", ticket.id)))
    }
}

fn ensure_window_open(event: &Event) -> Result<(), TicketingError> {
    if event.resale_window_open {
        Ok(())
    } else {
        Err(TicketingError::invalid(format!("resale window is closed for event {}", event.id)))
    }
}

const fn unknown_op<Op>(sync: &SyncState<Op>) -> Option<&Op> {
    match sync {
        SyncState::Unknown { op, .. } => Some(op),
        _ => None,
    }
}

/// Moves a created event from its provisional id to the one the ledger assigned.
///
/// A quarantined creation holding that id cannot have landed there, so it is
/// moved to a fresh provisional id and stays quarantined.
fn claim_ledger_id(catalog: &mut EventCatalog, local: EventId, assigned: EventId) -> Result<(), TicketingError> {
    if local == assigned {
        return Ok(());
    }
    if let Some(holder) = catalog.get(assigned) {
        if unknown_op(&holder.sync) != Some(&EventOp::Creation) {
            return Err(TicketingError::invalid(format!("event {assigned} is already held locally")));
        }
        let moved = catalog.relocate(assigned)?;
        tracing::warn!(from = %assigned, to = %moved, "Moved unresolved creation off a ledger-assigned id");
    }
    catalog.reassign_id(local, assigned)?;
    tracing::warn!(local = %local, ledger = %assigned, "Adopted ledger-assigned event id");
    Ok(())
}

/// Mints the tickets a receipt reports. Ids already present are logged and skipped.
fn mint_from_receipt(tickets: &mut TicketRegistry, event_id: EventId, receipt: &TransactionReceipt) -> Vec<Ticket> {
    let mut minted = Vec::new();
    for (owner, ticket_id) in receipt.minted_tickets() {
        match tickets.mint(event_id, ticket_id.clone(), owner.clone()) {
            Ok(ticket) => minted.push(ticket.clone()),
            Err(err) => {
                tracing::error!(event_id = %event_id, ticket_id = %ticket_id, error = %err, "Ledger minted a ticket id already known locally");
            }
        }
    }
    minted
}

/// Applies what a confirmation adds beyond the optimistic mutation.
fn finalize_ticket(tickets: &mut TicketRegistry, ticket_id: &TicketId, op: &TicketOp) -> Result<(), TicketingError> {
    if let TicketOp::Verification { .. } = op {
        tickets.set_verified(ticket_id)?;
    }
    Ok(())
}

/// Undoes an optimistic ticket mutation exactly.
fn rollback_ticket(tickets: &mut TicketRegistry, ticket_id: &TicketId, op: &TicketOp) -> Result<(), TicketingError> {
    match op {
        TicketOp::ResaleToggle { previous_active, previous_price }
        | TicketOp::ResaleListing { previous_active, previous_price } => {
            tickets.set_resale_active(ticket_id, *previous_active)?;
            tickets.set_asking_price(ticket_id, *previous_price)?;
        }
        TicketOp::ResalePurchase { previous_owner, previous_price, .. } => {
            tickets.transfer(ticket_id, previous_owner.clone())?;
            tickets.set_resale_active(ticket_id, true)?;
            tickets.set_asking_price(ticket_id, *previous_price)?;
        }
        TicketOp::Verification { previous_active } => {
            tickets.set_resale_active(ticket_id, *previous_active)?;
        }
    }
    Ok(())
}

/// Undoes an optimistic event mutation exactly. Returns `false` when the
/// record itself was removed.
fn rollback_event(catalog: &mut EventCatalog, event_id: EventId, op: &EventOp) -> Result<bool, TicketingError> {
    match op {
        EventOp::Creation => {
            catalog.retract(event_id)?;
            return Ok(false);
        }
        EventOp::PrimarySale { quantity, .. } => {
            catalog.restore_available(event_id, *quantity)?;
        }
        EventOp::ResaleWindowToggle { previous } => {
            catalog.set_resale_window(event_id, *previous)?;
        }
    }
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registry_with_listing() -> (TicketRegistry, TicketId) {
        let mut tickets = TicketRegistry::new();
        let id = TicketId::new("T-001");
        tickets.mint(EventId::new(1), id.clone(), Address::new("0xSeller")).unwrap();
        tickets.set_resale_active(&id, true).unwrap();
        tickets.set_asking_price(&id, Some(Price::parse("0.12").unwrap())).unwrap();
        (tickets, id)
    }

    #[test]
    fn test_rollback_resale_purchase_restores_listing() {
        let (mut tickets, id) = registry_with_listing();
        let before = tickets.get(&id).unwrap().clone();
        let op = TicketOp::ResalePurchase {
            previous_owner: before.owner.clone(),
            buyer: Address::new("0xBuyer"),
            previous_price: before.asking_price,
        };

        tickets.transfer(&id, Address::new("0xBuyer")).unwrap();
        tickets.set_resale_active(&id, false).unwrap();
        tickets.set_asking_price(&id, None).unwrap();
        rollback_ticket(&mut tickets, &id, &op).unwrap();

        assert_eq!(tickets.get(&id).unwrap(), &before);
    }

    #[test]
    fn test_rollback_verification_restores_resale_flag_only() {
        let (mut tickets, id) = registry_with_listing();
        tickets.set_resale_active(&id, false).unwrap();
        rollback_ticket(&mut tickets, &id, &TicketOp::Verification { previous_active: true }).unwrap();

        let ticket = tickets.get(&id).unwrap();
        assert!(ticket.resale_active);
        assert!(!ticket.verified);
    }

    #[test]
    fn test_finalize_verification_sets_flag() {
        let (mut tickets, id) = registry_with_listing();
        finalize_ticket(&mut tickets, &id, &TicketOp::Verification { previous_active: true }).unwrap();
        assert!(tickets.is_verified(&id));
        assert!(!tickets.is_resale_active(&id));
    }

    #[test]
    fn test_rollback_event_creation_removes_record() {
        let mut catalog = EventCatalog::new();
        let spec = EventSpec::new("Test", 10, Price::parse("0.1").unwrap(), Price::parse("0.15").unwrap());
        let id = catalog.create(spec).unwrap().id;
        catalog
            .set_sync(id, SyncState::Pending { op: EventOp::Creation, since: Utc::now() })
            .unwrap();

        assert!(!rollback_event(&mut catalog, id, &EventOp::Creation).unwrap());
        assert!(catalog.get(id).is_none());
    }

    #[test]
    fn test_rollback_primary_sale_restores_supply() {
        let mut catalog = EventCatalog::new();
        let spec = EventSpec::new("Test", 10, Price::parse("0.1").unwrap(), Price::parse("0.15").unwrap());
        let id = catalog.create(spec).unwrap().id;
        catalog.decrement_available(id, 4).unwrap();

        let op = EventOp::PrimarySale { quantity: 4, buyer: Address::new("0xBuyer") };
        assert!(rollback_event(&mut catalog, id, &op).unwrap());
        assert_eq!(catalog.get(id).unwrap().available, 10);
    }

    fn creation(catalog: &mut EventCatalog, name: &str, sync: SyncState<EventOp>) -> EventId {
        let spec = EventSpec::new(name, 10, Price::parse("0.1").unwrap(), Price::parse("0.15").unwrap());
        let id = catalog.create(spec).unwrap().id;
        catalog.set_sync(id, sync).unwrap();
        id
    }

    #[test]
    fn test_claim_moves_unresolved_creation_aside() {
        let mut catalog = EventCatalog::new();
        let unknown = SyncState::Unknown { op: EventOp::Creation, since: Utc::now(), tx_hash: None };
        let dropped = creation(&mut catalog, "Dropped", unknown);
        let retried = creation(&mut catalog, "Retried", SyncState::Pending { op: EventOp::Creation, since: Utc::now() });

        claim_ledger_id(&mut catalog, retried, dropped).unwrap();

        assert_eq!(catalog.get(dropped).unwrap().name, "Retried");
        let moved = catalog.quarantined();
        assert_eq!(moved.len(), 1);
        assert_ne!(moved[0], dropped);
        assert_eq!(catalog.get(moved[0]).unwrap().name, "Dropped");
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_claim_refuses_id_of_settled_record() {
        let mut catalog = EventCatalog::new();
        let settled = creation(&mut catalog, "Settled", SyncState::Synced);
        let created = creation(&mut catalog, "New", SyncState::Pending { op: EventOp::Creation, since: Utc::now() });

        assert!(claim_ledger_id(&mut catalog, created, settled).is_err());
        assert_eq!(catalog.get(settled).unwrap().name, "Settled");
        assert_eq!(catalog.get(created).unwrap().name, "New");
    }
}
