//! Resolving quarantined records from ledger reads.
//!
//! A record in [`SyncState::Unknown`] carries the operation whose outcome was
//! never observed. Resolution reads the ledger, decides whether that operation
//! landed, finalizes or rolls back the optimistic mutation accordingly, and
//! then adopts the ledger's view of the record.

use super::{Reconciler, claim_ledger_id, finalize_ticket, rollback_event, rollback_ticket, unknown_op};
use crate::gateway::{EventDetails, GatewayError, TicketDetails};
use crate::metrics;
use crate::retry::retry_read;
use ticket_ledger_core::catalog::EventCatalog;
use ticket_ledger_core::error::TicketingError;
use ticket_ledger_core::registry::TicketRegistry;
use ticket_ledger_core::sync::{EventOp, RecordKey, SyncState, TicketOp};
use ticket_ledger_core::types::{Address, EventId, TicketId};

/// How a quarantined record was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The operation landed; the optimistic mutation stands
    Finalized,
    /// The operation did not land; the mutation was undone
    RolledBack,
    /// Nothing to resolve
    AlreadySynced,
}

impl Resolution {
    /// Label value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Finalized => "finalized",
            Self::RolledBack => "rolled_back",
            Self::AlreadySynced => "already_synced",
        }
    }
}

/// Outcome of [`Reconciler::reconcile_all`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Records resolved, in the order they were visited
    pub resolved: Vec<(RecordKey, Resolution)>,
    /// Records still quarantined, with the reason
    pub failed: Vec<(RecordKey, TicketingError)>,
}

impl ReconciliationReport {
    /// `true` if every quarantined record was resolved
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Reconciler {
    /// Records awaiting reconciliation, events first.
    pub async fn quarantined(&self) -> Vec<RecordKey> {
        let catalog = self.catalog.read().await;
        let tickets = self.tickets.read().await;
        catalog
            .quarantined()
            .into_iter()
            .map(RecordKey::Event)
            .chain(tickets.quarantined().into_iter().map(RecordKey::Ticket))
            .collect()
    }

    /// Resolves a quarantined event.
    ///
    /// An unconfirmed creation may have landed under a different id than its
    /// provisional one. It is matched by name and creator against ledger
    /// events no settled local record already accounts for, and moves to the
    /// ledger's id when found.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown event,
    /// [`TicketingError::ConflictPending`] while its transaction is still in
    /// flight, [`TicketingError::Transport`] if the ledger stays unreachable
    /// after retries (the record remains quarantined).
    pub async fn reconcile_event(&self, event_id: EventId) -> Result<Resolution, TicketingError> {
        let (op, name, creator) = {
            let catalog = self.catalog.read().await;
            let event = catalog.get(event_id).ok_or_else(|| TicketingError::unknown_event(event_id))?;
            match &event.sync {
                SyncState::Synced => return Ok(Resolution::AlreadySynced),
                SyncState::Pending { .. } => {
                    return Err(TicketingError::ConflictPending { record: RecordKey::Event(event_id) });
                }
                SyncState::Unknown { op, .. } => (op.clone(), event.name.clone(), event.creator.clone()),
            }
        };

        let _creating = match &op {
            EventOp::Creation => Some(self.creating.lock().await),
            _ => None,
        };
        let (remote, candidates) = match &op {
            EventOp::Creation => (None, self.ledger_events_like(&name, creator.as_ref()).await?),
            _ => (self.read_event(event_id).await?, Vec::new()),
        };
        let buyer_holdings = match &op {
            EventOp::PrimarySale { buyer, .. } => {
                let record = RecordKey::Event(event_id);
                retry_read(
                    &self.read_retry,
                    "tickets_owned_by",
                    || self.gateway.get_tickets_owned_by(event_id, buyer),
                    GatewayError::is_transient,
                )
                .await
                .map_err(|err| err.into_ticketing(record))?
            }
            _ => Vec::new(),
        };

        let mut catalog = self.catalog.write().await;
        if catalog.get(event_id).and_then(|event| unknown_op(&event.sync)) != Some(&op) {
            // resolved concurrently
            return Ok(Resolution::AlreadySynced);
        }

        let resolution = match &op {
            EventOp::Creation => {
                let found = candidates
                    .into_iter()
                    .find(|details| !accounted_for(&catalog, event_id, details));
                let Some(details) = found else {
                    rollback_event(&mut catalog, event_id, &op)?;
                    metrics::record_resolved(Resolution::RolledBack.as_str());
                    tracing::warn!(event_id = %event_id, "Unconfirmed event creation not found on the ledger; record removed");
                    return Ok(Resolution::RolledBack);
                };
                claim_ledger_id(&mut catalog, event_id, details.event_id)?;
                adopt_event(&mut catalog, details.event_id, &details)?;
                catalog.set_sync(details.event_id, SyncState::Synced)?;
                metrics::record_event_created();
                metrics::record_resolved(Resolution::Finalized.as_str());
                tracing::info!(
                    local = %event_id,
                    event_id = %details.event_id,
                    "Unconfirmed event creation found on the ledger"
                );
                return Ok(Resolution::Finalized);
            }
            EventOp::PrimarySale { quantity, buyer } => {
                let mut tickets = self.tickets.write().await;
                let unseen: Vec<TicketDetails> = buyer_holdings
                    .into_iter()
                    .filter(|ticket| tickets.get(&ticket.ticket_id).is_none())
                    .collect();

                if unseen.len() >= *quantity as usize {
                    for ticket in unseen {
                        if let Err(err) = tickets.mint(event_id, ticket.ticket_id.clone(), buyer.clone()) {
                            tracing::error!(ticket_id = %ticket.ticket_id, error = %err, "Could not mint reconciled ticket");
                        } else {
                            metrics::record_tickets_minted(1);
                        }
                    }
                    Resolution::Finalized
                } else {
                    rollback_event(&mut catalog, event_id, &op)?;
                    Resolution::RolledBack
                }
            }
            EventOp::ResaleWindowToggle { previous } => {
                if remote.as_ref().is_some_and(|details| details.resale_window_open != *previous) {
                    Resolution::Finalized
                } else {
                    rollback_event(&mut catalog, event_id, &op)?;
                    Resolution::RolledBack
                }
            }
        };

        if let Some(details) = &remote {
            adopt_event(&mut catalog, event_id, details)?;
        }
        catalog.set_sync(event_id, SyncState::Synced)?;
        metrics::record_resolved(resolution.as_str());
        tracing::info!(
            event_id = %event_id,
            operation = op.label(),
            resolution = resolution.as_str(),
            "Quarantined event resolved"
        );
        Ok(resolution)
    }

    /// Resolves a quarantined ticket.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown ticket,
    /// [`TicketingError::ConflictPending`] while its transaction is still in
    /// flight, [`TicketingError::Transport`] if the ledger stays unreachable
    /// after retries (the record remains quarantined).
    pub async fn reconcile_ticket(&self, ticket_id: &TicketId) -> Result<Resolution, TicketingError> {
        let (event_id, op) = {
            let tickets = self.tickets.read().await;
            let ticket = tickets.get(ticket_id).ok_or_else(|| TicketingError::unknown_ticket(ticket_id))?;
            match &ticket.sync {
                SyncState::Synced => return Ok(Resolution::AlreadySynced),
                SyncState::Pending { .. } => {
                    return Err(TicketingError::ConflictPending { record: RecordKey::Ticket(ticket_id.clone()) });
                }
                SyncState::Unknown { op, .. } => (ticket.event_id, op.clone()),
            }
        };

        let record = RecordKey::Ticket(ticket_id.clone());
        let remote = retry_read(
            &self.read_retry,
            "ticket",
            || self.gateway.get_ticket_details(event_id, ticket_id),
            GatewayError::is_transient,
        )
        .await
        .map_err(|err| err.into_ticketing(record))?;

        let mut tickets = self.tickets.write().await;
        let Some(local) = tickets.get(ticket_id).cloned() else {
            return Err(TicketingError::unknown_ticket(ticket_id));
        };
        if unknown_op(&local.sync) != Some(&op) {
            return Ok(Resolution::AlreadySynced);
        }

        let landed = remote.as_ref().is_some_and(|details| match &op {
            TicketOp::ResaleToggle { previous_active, .. } => details.resale_active != *previous_active,
            TicketOp::ResaleListing { .. } => details.resale_active && details.price == local.asking_price,
            TicketOp::ResalePurchase { buyer, .. } => details.owner == *buyer,
            TicketOp::Verification { .. } => details.verified,
        });

        let resolution = if landed {
            finalize_ticket(&mut tickets, ticket_id, &op)?;
            Resolution::Finalized
        } else {
            rollback_ticket(&mut tickets, ticket_id, &op)?;
            Resolution::RolledBack
        };

        match &remote {
            Some(details) => adopt_ticket(&mut tickets, ticket_id, details)?,
            None => tracing::error!(ticket_id = %ticket_id, "Ticket unknown to the ledger"),
        }
        tickets.set_sync(ticket_id, SyncState::Synced)?;
        metrics::record_resolved(resolution.as_str());
        tracing::info!(
            ticket_id = %ticket_id,
            operation = op.label(),
            resolution = resolution.as_str(),
            "Quarantined ticket resolved"
        );
        Ok(resolution)
    }

    /// Resolves every quarantined record.
    ///
    /// Records that cannot be resolved stay quarantined and are listed in
    /// [`ReconciliationReport::failed`].
    pub async fn reconcile_all(&self) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();
        for record in self.quarantined().await {
            let result = match &record {
                RecordKey::Event(event_id) => self.reconcile_event(*event_id).await,
                RecordKey::Ticket(ticket_id) => self.reconcile_ticket(ticket_id).await,
            };
            match result {
                Ok(resolution) => report.resolved.push((record, resolution)),
                Err(err) => {
                    tracing::warn!(record = %record, error = %err, "Record could not be reconciled");
                    report.failed.push((record, err));
                }
            }
        }
        report
    }

    /// Ledger events named `name` by `creator`. Ledger ids are dense, so the
    /// walk ends at the first id the ledger does not know.
    async fn ledger_events_like(
        &self,
        name: &str,
        creator: Option<&Address>,
    ) -> Result<Vec<EventDetails>, TicketingError> {
        let mut found = Vec::new();
        let mut ledger_id = EventId::new(1);
        while let Some(details) = self.read_event(ledger_id).await? {
            if details.name == name && Some(&details.creator) == creator {
                found.push(details);
            }
            ledger_id = ledger_id.next();
        }
        Ok(found)
    }

    async fn read_event(&self, event_id: EventId) -> Result<Option<EventDetails>, TicketingError> {
        retry_read(
            &self.read_retry,
            "event",
            || self.gateway.get_event_details(event_id),
            GatewayError::is_transient,
        )
        .await
        .map_err(|err| err.into_ticketing(RecordKey::Event(event_id)))
    }
}

/// A settled local record other than `record` already stands for `details`.
fn accounted_for(catalog: &EventCatalog, record: EventId, details: &EventDetails) -> bool {
    catalog.get(details.event_id).is_some_and(|held| {
        held.id != record
            && held.sync.is_synced()
            && held.name == details.name
            && held.creator.as_ref() == Some(&details.creator)
    })
}

fn adopt_event(catalog: &mut EventCatalog, event_id: EventId, details: &EventDetails) -> Result<(), TicketingError> {
    let Some(local) = catalog.get(event_id) else {
        return Ok(());
    };
    if local.available != details.available || local.resale_window_open != details.resale_window_open {
        tracing::warn!(
            event_id = %event_id,
            local_available = local.available,
            ledger_available = details.available,
            ledger_window_open = details.resale_window_open,
            "Adopting ledger state for event"
        );
    }
    catalog.set_available(event_id, details.available)?;
    catalog.set_resale_window(event_id, details.resale_window_open)
}

fn adopt_ticket(tickets: &mut TicketRegistry, ticket_id: &TicketId, details: &TicketDetails) -> Result<(), TicketingError> {
    if details.verified {
        tickets.set_verified(ticket_id)?;
    } else {
        tickets.set_resale_active(ticket_id, details.resale_active)?;
    }
    tickets.transfer(ticket_id, details.owner.clone())?;
    if details.resale_active {
        tickets.set_asking_price(ticket_id, details.price)?;
    }
    Ok(())
}
