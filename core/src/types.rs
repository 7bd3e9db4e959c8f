//! Domain types for the ticket lifecycle engine.
//!
//! Value objects (identifiers, addresses, prices) and the two entities the
//! engine tracks locally: [`Event`] and [`Ticket`].

use crate::error::TicketingError;
use crate::sync::{EventOp, SyncState, TicketOp};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of an event, assigned monotonically at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Creates an `EventId` from its numeric value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the identifier that follows this one
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a ticket (e.g. `"T-001"`), unique and stable once minted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Creates a `TicketId` from any string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the identifier for the ledger's n-th minted token
    #[must_use]
    pub fn from_serial(serial: u64) -> Self {
        Self(format!("T-{serial:03}"))
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wallet or contract address.
///
/// Compared case-insensitively: the value is normalized to lowercase on
/// construction.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Creates a normalized `Address`
    #[must_use]
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(address.as_ref().trim().to_ascii_lowercase())
    }

    /// Returns the address as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Price Value Object (fixed-point, 18 fractional digits)
// ============================================================================

/// Number of fractional digits carried by a [`Price`].
pub const PRICE_DECIMALS: usize = 18;

/// Smallest-unit count in one whole currency unit.
pub const UNITS_PER_WHOLE: u128 = 1_000_000_000_000_000_000;

/// A currency amount such as `"0.15"`.
///
/// Stored as an integer count of the smallest unit to avoid floating-point
/// errors; serialized as its decimal string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Price(u128);

impl Price {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Price` from a smallest-unit count
    #[must_use]
    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// Returns the smallest-unit count
    #[must_use]
    pub const fn units(&self) -> u128 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies the price by a quantity with overflow checking
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u128) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Parses a decimal string such as `"0.15"` or `"2"`.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::InvalidParameters`] for empty, signed,
    /// malformed, over-precise (more than 18 fractional digits) or
    /// overflowing input.
    pub fn parse(input: &str) -> Result<Self, TicketingError> {
        let invalid = || TicketingError::invalid(format!("invalid price '{input}'"));
        let trimmed = input.trim();
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > PRICE_DECIMALS {
            return Err(TicketingError::invalid(format!(
                "price '{input}' has more than {PRICE_DECIMALS} decimal places"
            )));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .ok()
                .and_then(|w| w.checked_mul(UNITS_PER_WHOLE))
                .ok_or_else(invalid)?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<PRICE_DECIMALS$}")
                .parse::<u128>()
                .map_err(|_| invalid())?
        };

        whole_units.checked_add(fraction_units).map(Self).ok_or_else(invalid)
    }
}

impl FromStr for Price {
    type Err = TicketingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Price {
    type Error = TicketingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Price> for String {
    fn from(value: Price) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_WHOLE;
        let fraction = self.0 % UNITS_PER_WHOLE;
        if fraction == 0 {
            write!(f, "{whole}.0")
        } else {
            let digits = format!("{fraction:0PRICE_DECIMALS$}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Conferences, meetups, hackathons
    Conference,
    /// Live music
    Concert,
    /// Sporting fixtures
    Sports,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Conference => "conference",
            Self::Concert => "concert",
            Self::Sports => "sports",
        })
    }
}

impl FromStr for Category {
    type Err = TicketingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conference" => Ok(Self::Conference),
            "concert" => Ok(Self::Concert),
            "sports" => Ok(Self::Sports),
            other => Err(TicketingError::invalid(format!("unknown category '{other}'"))),
        }
    }
}

/// Organizer input for creating an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Event name
    pub name: String,
    /// Start date and time (venue local)
    pub starts_at: Option<NaiveDateTime>,
    /// Venue / city
    pub location: String,
    /// Free-form description
    pub description: String,
    /// Category
    pub category: Category,
    /// Primary sale unit price
    pub price: Price,
    /// Ceiling for resale listings
    pub max_resale_price: Price,
    /// Total number of tickets that can ever be sold
    pub max_supply: u32,
    /// Address allowed to verify tickets at the gate
    pub gate_address: Option<Address>,
}

impl EventSpec {
    /// Creates a spec with the fields the ledger cares about; the rest default.
    #[must_use]
    pub fn new(name: impl Into<String>, max_supply: u32, price: Price, max_resale_price: Price) -> Self {
        Self {
            name: name.into(),
            starts_at: None,
            location: String::new(),
            description: String::new(),
            category: Category::Conference,
            price,
            max_resale_price,
            max_supply,
            gate_address: None,
        }
    }

    /// Sets the start date and time
    #[must_use]
    pub const fn with_starts_at(mut self, starts_at: NaiveDateTime) -> Self {
        self.starts_at = Some(starts_at);
        self
    }

    /// Sets the location
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the category
    #[must_use]
    pub const fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Sets the gate verification address
    #[must_use]
    pub fn with_gate_address(mut self, gate: Address) -> Self {
        self.gate_address = Some(gate);
        self
    }

    /// Validates organizer input.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::InvalidParameters`] if the name is blank, the
    /// supply is zero, or the resale ceiling is below the primary price.
    pub fn validate(&self) -> Result<(), TicketingError> {
        if self.name.trim().is_empty() {
            return Err(TicketingError::invalid("event name must not be empty"));
        }
        if self.max_supply == 0 {
            return Err(TicketingError::invalid("max supply must be greater than zero"));
        }
        if self.max_resale_price < self.price {
            return Err(TicketingError::invalid(format!(
                "resale ceiling {} is below the primary price {}",
                self.max_resale_price, self.price
            )));
        }
        Ok(())
    }
}

/// An event known to the local catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Event name
    pub name: String,
    /// Start date and time
    pub starts_at: Option<NaiveDateTime>,
    /// Venue / city
    pub location: String,
    /// Free-form description
    pub description: String,
    /// Category
    pub category: Category,
    /// Primary sale unit price
    pub price: Price,
    /// Ceiling for resale listings
    pub max_resale_price: Price,
    /// Total supply
    pub max_supply: u32,
    /// Tickets still available for primary sale (`0 <= available <= max_supply`)
    pub available: u32,
    /// Organizer address, unset until the creating wallet is known
    pub creator: Option<Address>,
    /// Gate verification address
    pub gate_address: Option<Address>,
    /// Whether holders may list and buy on the resale market
    pub resale_window_open: bool,
    /// Relationship to the ledger
    pub sync: SyncState<EventOp>,
}

impl Event {
    /// Builds a fresh event record from a spec: full supply, no creator,
    /// resale window closed.
    #[must_use]
    pub fn from_spec(id: EventId, spec: EventSpec) -> Self {
        Self {
            id,
            name: spec.name,
            starts_at: spec.starts_at,
            location: spec.location,
            description: spec.description,
            category: spec.category,
            price: spec.price,
            max_resale_price: spec.max_resale_price,
            max_supply: spec.max_supply,
            available: spec.max_supply,
            creator: None,
            gate_address: spec.gate_address,
            resale_window_open: false,
            sync: SyncState::Synced,
        }
    }

    /// Tickets sold so far
    #[must_use]
    pub const fn sold(&self) -> u32 {
        self.max_supply - self.available
    }

    /// Checks if the requested quantity can still be sold
    #[must_use]
    pub const fn has_availability(&self, quantity: u32) -> bool {
        self.available >= quantity
    }

    /// Checks whether `address` may verify tickets for this event
    #[must_use]
    pub fn is_gatekeeper(&self, address: &Address) -> bool {
        self.creator.as_ref() == Some(address) || self.gate_address.as_ref() == Some(address)
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// Resale flag as seen by readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResaleState {
    /// Not offered for resale
    Inactive,
    /// Offered for resale
    Active,
    /// A transaction touching the flag timed out; the true value is not known
    Unknown,
}

/// A ticket known to the local registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub id: TicketId,
    /// Owning event
    pub event_id: EventId,
    /// Current holder
    pub owner: Address,
    /// Whether the ticket is offered for resale
    pub resale_active: bool,
    /// Last resale asking price
    pub asking_price: Option<Price>,
    /// Redeemed at the gate; once set, never cleared
    pub verified: bool,
    /// Relationship to the ledger
    pub sync: SyncState<TicketOp>,
}

impl Ticket {
    /// Creates a freshly minted ticket
    #[must_use]
    pub const fn new(id: TicketId, event_id: EventId, owner: Address) -> Self {
        Self {
            id,
            event_id,
            owner,
            resale_active: false,
            asking_price: None,
            verified: false,
            sync: SyncState::Synced,
        }
    }

    /// Resale flag including the quarantined sub-state
    #[must_use]
    pub const fn resale_state(&self) -> ResaleState {
        if self.sync.is_unknown() {
            ResaleState::Unknown
        } else if self.resale_active {
            ResaleState::Active
        } else {
            ResaleState::Inactive
        }
    }
}
