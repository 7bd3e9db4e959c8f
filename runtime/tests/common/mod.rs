//! Shared setup for reconciler integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;
use ticket_ledger_core::catalog::EventCatalog;
use ticket_ledger_core::registry::TicketRegistry;
use ticket_ledger_core::types::{Address, Event, EventId, EventSpec, Price, Ticket, TicketId};
use ticket_ledger_runtime::{ContractGateway, Reconciler, RetryPolicy, RuntimeConfig};
use ticket_ledger_testing::{InMemoryLedger, LocalSigner, test_clock};

pub const ORGANIZER: &str = "0xorganizer";
pub const HOLDER: &str = "0xholder";
pub const BUYER: &str = "0xbuyer";
pub const RIVAL: &str = "0xrival";
pub const GATE: &str = "0xgate";

/// Routes engine logs to the test harness; set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short bounds so paused-time tests resolve quickly.
pub fn config() -> RuntimeConfig {
    RuntimeConfig::default()
        .with_submission_timeout(Duration::from_secs(2))
        .with_confirmation_timeout(Duration::from_secs(5))
        .with_read_retry(RetryPolicy::none())
}

pub fn price(input: &str) -> Price {
    Price::parse(input).unwrap()
}

/// Event 1: "Test", supply 10 at 0.1, ceiling 0.15, created by [`ORGANIZER`].
pub fn test_event(resale_window_open: bool) -> Event {
    let spec = EventSpec::new("Test", 10, price("0.1"), price("0.15")).with_gate_address(Address::new(GATE));
    let mut event = Event::from_spec(EventId::new(1), spec);
    event.creator = Some(Address::new(ORGANIZER));
    event.resale_window_open = resale_window_open;
    event
}

/// A synced ticket of event 1 held by `owner`, optionally listed at `asking`.
pub fn test_ticket(id: &str, owner: &str, asking: Option<&str>) -> Ticket {
    let mut ticket = Ticket::new(TicketId::new(id), EventId::new(1), Address::new(owner));
    if let Some(asking) = asking {
        ticket.resale_active = true;
        ticket.asking_price = Some(price(asking));
    }
    ticket
}

/// Writes the same records onto the ledger.
pub fn seed_ledger(ledger: &InMemoryLedger, events: &[Event], tickets: &[Ticket]) {
    for event in events {
        ledger.seed_event(event);
    }
    for ticket in tickets {
        ledger.seed_ticket(ticket);
    }
}

/// A reconciler acting as `caller` whose local view holds `events` and `tickets`.
pub fn reconciler(ledger: &Arc<InMemoryLedger>, caller: &str, events: &[Event], tickets: &[Ticket]) -> Reconciler {
    init_tracing();
    let config = config();
    let gateway = ContractGateway::new(ledger.clone(), ledger.contract().clone(), &config);
    gateway.initialize(LocalSigner::shared(caller));

    let mut catalog = EventCatalog::new();
    for event in events {
        catalog.insert(event.clone()).unwrap();
    }
    let mut registry = TicketRegistry::new();
    for ticket in tickets {
        registry.mint(ticket.event_id, ticket.id.clone(), ticket.owner.clone()).unwrap();
        registry.set_asking_price(&ticket.id, ticket.asking_price).unwrap();
        registry.set_resale_active(&ticket.id, ticket.resale_active).unwrap();
        if ticket.verified {
            registry.set_verified(&ticket.id).unwrap();
        }
    }

    Reconciler::new(Arc::new(gateway), catalog, registry, Arc::new(test_clock()), &config)
}

/// Ledger seeded with the open-window test event and `tickets`, plus a
/// reconciler for `caller` sharing that view.
pub fn seeded(caller: &str, tickets: &[Ticket]) -> (Arc<InMemoryLedger>, Reconciler) {
    let ledger = InMemoryLedger::new().with_latency(Duration::from_millis(50)).shared();
    let events = [test_event(true)];
    seed_ledger(&ledger, &events, tickets);
    let reconciler = reconciler(&ledger, caller, &events, tickets);
    (ledger, reconciler)
}
