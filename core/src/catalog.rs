//! Event catalog - the local registry of events.
//!
//! Authoritative until reconciled: the catalog enforces the supply invariant
//! `0 <= available <= max_supply` on every mutation, but the ledger decides
//! whether a mutation stands. Pure in-memory bookkeeping, no I/O.

use crate::error::TicketingError;
use crate::sync::{EventOp, SyncState};
use crate::types::{Address, Event, EventId, EventSpec};
use std::collections::BTreeMap;

/// In-memory event registry.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    events: BTreeMap<EventId, Event>,
    next_id: u64,
}

impl EventCatalog {
    /// Creates an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self { events: BTreeMap::new(), next_id: 1 }
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Checks if the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Creates an event from organizer input.
    ///
    /// Assigns the next free id, sets `available = max_supply`, leaves the
    /// creator unset and the resale window closed.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::InvalidParameters`] if the spec fails
    /// validation.
    pub fn create(&mut self, spec: EventSpec) -> Result<&Event, TicketingError> {
        spec.validate()?;
        let id = self.allocate_id();
        Ok(self.events.entry(id).or_insert_with(|| Event::from_spec(id, spec)))
    }

    /// Inserts a fully formed record (fixtures, ledger imports).
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::InvalidParameters`] if the id is taken or the
    /// record violates the supply invariant.
    pub fn insert(&mut self, event: Event) -> Result<(), TicketingError> {
        if self.events.contains_key(&event.id) {
            return Err(TicketingError::invalid(format!("event {} already exists", event.id)));
        }
        if event.available > event.max_supply {
            return Err(TicketingError::invalid(format!(
                "event {} has {} available of {} supply",
                event.id, event.available, event.max_supply
            )));
        }
        self.next_id = self.next_id.max(event.id.value() + 1);
        self.events.insert(event.id, event);
        Ok(())
    }

    /// Looks up an event
    #[must_use]
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    /// All events in id order
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    /// Events created by `address`; empty when no address is given.
    #[must_use]
    pub fn list_by_creator(&self, address: Option<&Address>) -> Vec<&Event> {
        let Some(address) = address else {
            return Vec::new();
        };
        self.events
            .values()
            .filter(|event| event.creator.as_ref() == Some(address))
            .collect()
    }

    /// Deducts primary-sale supply and returns what is left.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InsufficientSupply`] if `amount > available`,
    /// [`TicketingError::InvalidParameters`] for an unknown event.
    pub fn decrement_available(&mut self, id: EventId, amount: u32) -> Result<u32, TicketingError> {
        let event = self.get_mut(id)?;
        if !event.has_availability(amount) {
            return Err(TicketingError::InsufficientSupply {
                event_id: id,
                requested: amount,
                available: event.available,
            });
        }
        event.available -= amount;
        Ok(event.available)
    }

    /// Returns previously deducted supply.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown event or if the
    /// result would exceed `max_supply`.
    pub fn restore_available(&mut self, id: EventId, amount: u32) -> Result<u32, TicketingError> {
        let event = self.get_mut(id)?;
        let restored = event
            .available
            .checked_add(amount)
            .filter(|restored| *restored <= event.max_supply)
            .ok_or_else(|| {
                TicketingError::invalid(format!(
                    "restoring {amount} to event {id} would exceed supply {}",
                    event.max_supply
                ))
            })?;
        event.available = restored;
        Ok(restored)
    }

    /// Adopts the ledger's remaining supply.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown event or a value
    /// above `max_supply`.
    pub fn set_available(&mut self, id: EventId, available: u32) -> Result<(), TicketingError> {
        let event = self.get_mut(id)?;
        if available > event.max_supply {
            return Err(TicketingError::invalid(format!(
                "event {id} cannot have {available} available of {} supply",
                event.max_supply
            )));
        }
        event.available = available;
        Ok(())
    }

    /// Binds the creator once.
    ///
    /// Re-binding the same address is a no-op.
    ///
    /// # Errors
    ///
    /// [`TicketingError::AlreadyBound`] if a different creator is bound,
    /// [`TicketingError::InvalidParameters`] for an unknown event.
    pub fn set_creator(&mut self, id: EventId, address: Address) -> Result<(), TicketingError> {
        let event = self.get_mut(id)?;
        match &event.creator {
            Some(existing) if *existing != address => Err(TicketingError::AlreadyBound {
                event_id: id,
                creator: existing.clone(),
            }),
            _ => {
                event.creator = Some(address);
                Ok(())
            }
        }
    }

    /// Opens or closes the resale window.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown event.
    pub fn set_resale_window(&mut self, id: EventId, open: bool) -> Result<(), TicketingError> {
        self.get_mut(id)?.resale_window_open = open;
        Ok(())
    }

    /// Replaces the sync sub-state.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] for an unknown event.
    pub fn set_sync(&mut self, id: EventId, sync: SyncState<EventOp>) -> Result<(), TicketingError> {
        self.get_mut(id)?.sync = sync;
        Ok(())
    }

    /// Removes an event whose creation the ledger never confirmed.
    ///
    /// Confirmed events are never removed.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] if the event is unknown or its
    /// creation is not pending / quarantined.
    pub fn retract(&mut self, id: EventId) -> Result<Event, TicketingError> {
        let event = self.get(id).ok_or_else(|| TicketingError::unknown_event(id))?;
        if event.sync.op() != Some(&EventOp::Creation) {
            return Err(TicketingError::invalid(format!(
                "event {id} is not awaiting creation and cannot be retracted"
            )));
        }
        let removed = self.events.remove(&id).ok_or_else(|| TicketingError::unknown_event(id))?;
        if self.next_id == id.value() + 1 {
            self.next_id = id.value();
        }
        Ok(removed)
    }

    /// Moves a pending creation to the id the ledger actually assigned.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] if `from` is unknown or not
    /// awaiting creation, or if `to` is already taken.
    pub fn reassign_id(&mut self, from: EventId, to: EventId) -> Result<(), TicketingError> {
        if from == to {
            return Ok(());
        }
        if self.events.contains_key(&to) {
            return Err(TicketingError::invalid(format!("event {to} already exists")));
        }
        let mut event = self.retract(from)?;
        event.id = to;
        self.next_id = self.next_id.max(to.value() + 1);
        self.events.insert(to, event);
        Ok(())
    }

    /// Moves a creation awaiting confirmation to a fresh provisional id,
    /// freeing `from` for the record the ledger actually assigned it to.
    ///
    /// # Errors
    ///
    /// [`TicketingError::InvalidParameters`] if `from` is unknown or not
    /// awaiting creation.
    pub fn relocate(&mut self, from: EventId) -> Result<EventId, TicketingError> {
        let event = self.get(from).ok_or_else(|| TicketingError::unknown_event(from))?;
        if event.sync.op() != Some(&EventOp::Creation) {
            return Err(TicketingError::invalid(format!("event {from} is not awaiting creation")));
        }
        let to = self.allocate_id();
        let mut event = self.events.remove(&from).ok_or_else(|| TicketingError::unknown_event(from))?;
        event.id = to;
        self.events.insert(to, event);
        Ok(to)
    }

    /// Events quarantined after a confirmation timeout
    #[must_use]
    pub fn quarantined(&self) -> Vec<EventId> {
        self.events
            .values()
            .filter(|event| event.sync.is_unknown())
            .map(|event| event.id)
            .collect()
    }

    fn get_mut(&mut self, id: EventId) -> Result<&mut Event, TicketingError> {
        self.events.get_mut(&id).ok_or_else(|| TicketingError::unknown_event(id))
    }

    fn allocate_id(&mut self) -> EventId {
        let mut id = EventId::new(self.next_id.max(1));
        while self.events.contains_key(&id) {
            id = id.next();
        }
        self.next_id = id.value() + 1;
        id
    }
}
