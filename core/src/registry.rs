//! Ticket registry - the local registry of minted tickets.
//!
//! The registry owns every [`Ticket`] record. It does not know the catalog:
//! callers check that `event_id` refers to an existing event before minting.

use crate::error::TicketingError;
use crate::sync::{SyncState, TicketOp};
use crate::types::{Address, EventId, Price, ResaleState, Ticket, TicketId};
use std::collections::BTreeMap;

/// In-memory ticket registry.
#[derive(Debug, Clone, Default)]
pub struct TicketRegistry {
    tickets: BTreeMap<TicketId, Ticket>,
}

impl TicketRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tickets
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Checks if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Records a newly minted ticket.
    ///
    /// # Errors
    ///
    /// [`TicketingError::DuplicateTicket`] if the id already exists.
    pub fn mint(
        &mut self,
        event_id: EventId,
        ticket_id: TicketId,
        owner: Address,
    ) -> Result<&Ticket, TicketingError> {
        if self.tickets.contains_key(&ticket_id) {
            return Err(TicketingError::DuplicateTicket { ticket_id });
        }
        Ok(self
            .tickets
            .entry(ticket_id.clone())
            .or_insert_with(|| Ticket::new(ticket_id, event_id, owner)))
    }

    /// Looks up a ticket
    #[must_use]
    pub fn get(&self, id: &TicketId) -> Option<&Ticket> {
        self.tickets.get(id)
    }

    /// All tickets in id order
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    /// Tickets held by `owner`
    #[must_use]
    pub fn tickets_of(&self, owner: &Address) -> Vec<&Ticket> {
        self.tickets.values().filter(|ticket| ticket.owner == *owner).collect()
    }

    /// Tickets belonging to `event_id`
    #[must_use]
    pub fn tickets_for_event(&self, event_id: EventId) -> Vec<&Ticket> {
        self.tickets.values().filter(|ticket| ticket.event_id == event_id).collect()
    }

    /// `true` only if the ticket exists, is offered for resale, and its state is known
    #[must_use]
    pub fn is_resale_active(&self, id: &TicketId) -> bool {
        self.get(id)
            .is_some_and(|ticket| ticket.resale_state() == ResaleState::Active)
    }

    /// `true` only if the ticket exists and has been verified
    #[must_use]
    pub fn is_verified(&self, id: &TicketId) -> bool {
        self.get(id).is_some_and(|ticket| ticket.verified)
    }

    /// Turns the resale flag on or off.
    ///
    /// # Errors
    ///
    /// [`TicketingError::TicketVerified`] when activating a verified ticket,
    /// [`TicketingError::InvalidParameters`] for an unknown ticket.
    pub fn set_resale_active(&mut self, id: &TicketId, active: bool) -> Result<(), TicketingError> {
        let ticket = self.get_mut(id)?;
        if active && ticket.verified {
            return Err(TicketingError::TicketVerified { ticket_id: id.clone() });
        }
        ticket.resale_active = active;
        Ok(())
    }

    /// Sets or clears the asking price.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown ticket.
    pub fn set_asking_price(&mut self, id: &TicketId, price: Option<Price>) -> Result<(), TicketingError> {
        self.get_mut(id)?.asking_price = price;
        Ok(())
    }

    /// Moves the ticket to a new holder.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown ticket.
    pub fn transfer(&mut self, id: &TicketId, owner: Address) -> Result<(), TicketingError> {
        self.get_mut(id)?.owner = owner;
        Ok(())
    }

    /// Marks the ticket verified and clears its resale flag.
    ///
    /// Idempotent: returns `Ok(true)` on the first verification and
    /// `Ok(false)` when the ticket was already verified, leaving every field
    /// untouched.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown ticket.
    pub fn set_verified(&mut self, id: &TicketId) -> Result<bool, TicketingError> {
        let ticket = self.get_mut(id)?;
        if ticket.verified {
            return Ok(false);
        }
        ticket.verified = true;
        ticket.resale_active = false;
        Ok(true)
    }

    /// Replaces the sync sub-state.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown ticket.
    pub fn set_sync(&mut self, id: &TicketId, sync: SyncState<TicketOp>) -> Result<(), TicketingError> {
        self.get_mut(id)?.sync = sync;
        Ok(())
    }

    /// Tickets quarantined after a confirmation timeout
    #[must_use]
    pub fn quarantined(&self) -> Vec<TicketId> {
        self.tickets
            .values()
            .filter(|ticket| ticket.sync.is_unknown())
            .map(|ticket| ticket.id.clone())
            .collect()
    }

    fn get_mut(&mut self, id: &TicketId) -> Result<&mut Ticket, TicketingError> {
        self.tickets.get_mut(id).ok_or_else(|| TicketingError::unknown_ticket(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn holder() -> Address {
        Address::new("0xHolder")
    }

    fn registry_with(ids: &[&str]) -> TicketRegistry {
        let mut registry = TicketRegistry::new();
        for id in ids {
            registry.mint(EventId::new(1), TicketId::new(*id), holder()).unwrap();
        }
        registry
    }

    #[test]
    fn test_mint_rejects_duplicate_ids() {
        let mut registry = registry_with(&["T-001"]);
        let err = registry.mint(EventId::new(2), TicketId::new("T-001"), holder()).unwrap_err();
        assert_eq!(err, TicketingError::DuplicateTicket { ticket_id: TicketId::new("T-001") });
        assert_eq!(registry.get(&TicketId::new("T-001")).unwrap().event_id, EventId::new(1));
    }

    #[test]
    fn test_minted_ticket_defaults() {
        let registry = registry_with(&["T-001"]);
        let ticket = registry.get(&TicketId::new("T-001")).unwrap();
        assert!(!ticket.resale_active);
        assert!(!ticket.verified);
        assert_eq!(ticket.owner, holder());
        assert_eq!(ticket.resale_state(), ResaleState::Inactive);
    }

    #[test]
    fn test_verified_ticket_cannot_be_activated_for_resale() {
        let mut registry = registry_with(&["T-001"]);
        let id = TicketId::new("T-001");
        registry.set_resale_active(&id, true).unwrap();

        assert!(registry.set_verified(&id).unwrap());
        assert!(!registry.is_resale_active(&id));

        let err = registry.set_resale_active(&id, true).unwrap_err();
        assert_eq!(err, TicketingError::TicketVerified { ticket_id: id.clone() });
        registry.set_resale_active(&id, false).unwrap();
    }

    #[test]
    fn test_set_verified_is_idempotent() {
        let mut registry = registry_with(&["T-001"]);
        let id = TicketId::new("T-001");
        registry.set_asking_price(&id, Some(Price::parse("0.1").unwrap())).unwrap();

        assert!(registry.set_verified(&id).unwrap());
        let before = registry.get(&id).unwrap().clone();
        assert!(!registry.set_verified(&id).unwrap());
        assert_eq!(registry.get(&id).unwrap(), &before);
    }

    #[test]
    fn test_unknown_ticket_reads_are_false() {
        let registry = TicketRegistry::new();
        let id = TicketId::new("T-404");
        assert!(!registry.is_resale_active(&id));
        assert!(!registry.is_verified(&id));
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_unknown_sync_hides_resale_flag() {
        let mut registry = registry_with(&["T-001"]);
        let id = TicketId::new("T-001");
        registry.set_resale_active(&id, true).unwrap();
        registry
            .set_sync(
                &id,
                SyncState::Unknown {
                    op: TicketOp::ResaleToggle { previous_active: false, previous_price: None },
                    since: Utc::now(),
                    tx_hash: None,
                },
            )
            .unwrap();

        assert_eq!(registry.get(&id).unwrap().resale_state(), ResaleState::Unknown);
        assert!(!registry.is_resale_active(&id));
        assert_eq!(registry.quarantined(), vec![id]);
    }

    #[test]
    fn test_tickets_of_and_transfer() {
        let mut registry = registry_with(&["T-001", "T-002"]);
        let buyer = Address::new("0xBuyer");
        registry.transfer(&TicketId::new("T-002"), buyer.clone()).unwrap();

        assert_eq!(registry.tickets_of(&holder()).len(), 1);
        assert_eq!(registry.tickets_of(&buyer)[0].id, TicketId::new("T-002"));
        assert_eq!(registry.tickets_for_event(EventId::new(1)).len(), 2);
    }
}
