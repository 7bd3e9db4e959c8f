//! Demo catalog: seven events and six tickets.
//!
//! The same records are written into the local registries and onto the
//! simulated ledger so both sides start out in agreement.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ticket_ledger_core::catalog::EventCatalog;
use ticket_ledger_core::error::TicketingError;
use ticket_ledger_core::registry::TicketRegistry;
use ticket_ledger_core::types::{Address, Category, Event, EventId, EventSpec, Price, Ticket, TicketId};
use ticket_ledger_testing::InMemoryLedger;

/// Gate scanner shared by every demo event.
pub const DEMO_GATE_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

struct Fixture {
    name: &'static str,
    date: (i32, u32, u32),
    time: (u32, u32),
    location: &'static str,
    description: &'static str,
    category: Category,
    price: &'static str,
    max_resale_price: &'static str,
    max_supply: u32,
    available: u32,
    creator: &'static str,
}

const EVENTS: [Fixture; 7] = [
    Fixture {
        name: "ETH Global London 2025",
        date: (2025, 3, 15),
        time: (9, 0),
        location: "London, UK",
        description: "Join us for the biggest Ethereum event in London! Connect with developers, entrepreneurs, and enthusiasts from around the world. Experience three days of intensive learning, building, and networking.",
        category: Category::Conference,
        price: "0.1",
        max_resale_price: "0.15",
        max_supply: 500,
        available: 150,
        creator: "0x1234...5678",
    },
    Fixture {
        name: "Coldplay: Music Of The Spheres World Tour",
        date: (2025, 4, 20),
        time: (19, 30),
        location: "Wembley Stadium, London",
        description: "Experience Coldplay's groundbreaking Music Of The Spheres World Tour, featuring spectacular visuals, immersive technology, and all their greatest hits in an unforgettable eco-friendly show.",
        category: Category::Concert,
        price: "0.2",
        max_resale_price: "0.3",
        max_supply: 5000,
        available: 1000,
        creator: "0x9876...4321",
    },
    Fixture {
        name: "Cigarettes After Sex: World Tour 2025",
        date: (2025, 5, 15),
        time: (20, 0),
        location: "Royal Albert Hall, London",
        description: "Experience the dreamy, atmospheric sound of Cigarettes After Sex in the stunning Royal Albert Hall. An evening of ethereal pop and ambient rock that will transport you to another world.",
        category: Category::Concert,
        price: "0.15",
        max_resale_price: "0.25",
        max_supply: 2000,
        available: 800,
        creator: "0xabcd...efgh",
    },
    Fixture {
        name: "Mood Indigo: Live in Concert",
        date: (2025, 6, 10),
        time: (20, 30),
        location: "Barbican Centre, London",
        description: "Join us for an evening of jazz-infused indie rock with Mood Indigo. Experience their unique blend of genres in the world-class acoustics of the Barbican Centre.",
        category: Category::Concert,
        price: "0.12",
        max_resale_price: "0.18",
        max_supply: 1000,
        available: 400,
        creator: "0xijkl...mnop",
    },
    Fixture {
        name: "Diljit Dosanjh: Crossover World Tour",
        date: (2025, 7, 1),
        time: (19, 0),
        location: "The O2, London",
        description: "Global Punjabi superstar Diljit Dosanjh brings his electrifying Crossover World Tour to London. Experience a fusion of Punjabi folk, hip-hop, and pop in this high-energy spectacular.",
        category: Category::Concert,
        price: "0.18",
        max_resale_price: "0.28",
        max_supply: 20000,
        available: 5000,
        creator: "0xqrst...uvwx",
    },
    Fixture {
        name: "UEFA Champions League Final 2025",
        date: (2025, 5, 31),
        time: (20, 45),
        location: "Allianz Arena, Munich",
        description: "Experience the pinnacle of European club football as the continent's top teams battle for glory in the UEFA Champions League Final.",
        category: Category::Sports,
        price: "0.5",
        max_resale_price: "0.75",
        max_supply: 2000,
        available: 500,
        creator: "0xabcd...efgh",
    },
    Fixture {
        name: "East Bengal vs Mohun Bagan: Kolkata Derby",
        date: (2025, 7, 20),
        time: (19, 30),
        location: "Salt Lake Stadium, Kolkata",
        description: "Witness one of football's most passionate derbies as East Bengal takes on Mohun Bagan in the legendary Kolkata Derby. Experience over 100 years of rivalry in India's football capital.",
        category: Category::Sports,
        price: "0.08",
        max_resale_price: "0.12",
        max_supply: 85000,
        available: 20000,
        creator: "0xqrst...uvwx",
    },
];

// (ticket, event)
const TICKETS: [(&str, u64); 6] = [
    ("T-001", 1),
    ("T-002", 1),
    ("T-003", 2),
    ("T-004", 3),
    ("T-005", 4),
    ("T-006", 5),
];

/// The demo events, ids 1 through 7, resale windows open.
///
/// # Errors
///
/// [`TicketingError::InvalidParameters`] if a fixture price fails to parse.
pub fn demo_events() -> Result<Vec<Event>, TicketingError> {
    EVENTS
        .iter()
        .zip(1u64..)
        .map(|(fixture, id)| {
            let spec = EventSpec::new(
                fixture.name,
                fixture.max_supply,
                Price::parse(fixture.price)?,
                Price::parse(fixture.max_resale_price)?,
            )
            .with_location(fixture.location)
            .with_description(fixture.description)
            .with_category(fixture.category)
            .with_gate_address(Address::new(DEMO_GATE_ADDRESS));
            let spec = match starts_at(fixture.date, fixture.time) {
                Some(starts_at) => spec.with_starts_at(starts_at),
                None => spec,
            };
            spec.validate()?;

            let mut event = Event::from_spec(EventId::new(id), spec);
            event.available = fixture.available;
            event.creator = Some(Address::new(fixture.creator));
            event.resale_window_open = true;
            Ok(event)
        })
        .collect()
}

/// The demo tickets, all held by `holder`.
#[must_use]
pub fn demo_tickets(holder: &Address) -> Vec<Ticket> {
    TICKETS
        .iter()
        .map(|(ticket_id, event_id)| Ticket::new(TicketId::new(*ticket_id), EventId::new(*event_id), holder.clone()))
        .collect()
}

/// Local registries holding `events` and `tickets`.
///
/// # Errors
///
/// [`TicketingError::InvalidParameters`] for a duplicate event id,
/// [`TicketingError::DuplicateTicket`] for a duplicate ticket id.
pub fn registries(events: &[Event], tickets: &[Ticket]) -> Result<(EventCatalog, TicketRegistry), TicketingError> {
    let mut catalog = EventCatalog::new();
    for event in events {
        catalog.insert(event.clone())?;
    }
    let mut registry = TicketRegistry::new();
    for ticket in tickets {
        registry.mint(ticket.event_id, ticket.id.clone(), ticket.owner.clone())?;
    }
    Ok((catalog, registry))
}

/// Writes `events` and `tickets` onto the simulated ledger.
pub fn seed_ledger(ledger: &InMemoryLedger, events: &[Event], tickets: &[Ticket]) {
    for event in events {
        ledger.seed_event(event);
    }
    for ticket in tickets {
        ledger.seed_ticket(ticket);
    }
    tracing::debug!(events = events.len(), tickets = tickets.len(), "Seeded simulated ledger");
}

fn starts_at((year, month, day): (i32, u32, u32), (hour, minute): (u32, u32)) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(date.and_time(time))
}
