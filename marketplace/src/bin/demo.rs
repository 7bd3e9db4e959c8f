//! Marketplace Demo
//!
//! Walks the ticket lifecycle against the simulated ledger:
//! - Browsing the seeded catalog
//! - Creating an event and buying primary tickets
//! - Listing a ticket for resale and buying it from another wallet
//! - Verifying at the gate, including a duplicate scan
//! - A lost confirmation, quarantine and reconciliation
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin demo
//!
//! # slower ledger, more logging
//! DEMO_LEDGER_LATENCY_MS=500 RUST_LOG=debug cargo run --bin demo
//! ```

use anyhow::Context;
use marketplace::{Config, MarketplaceApp};
use std::env;
use ticket_ledger_core::error::TicketingError;
use ticket_ledger_core::types::{Address, Category, EventSpec, Price};
use ticket_ledger_runtime::metrics;
use ticket_ledger_testing::Fault;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HOLDER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
const ORGANIZER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
const COLLECTOR: &str = "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace=info,ticket_ledger_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prometheus = metrics::install_prometheus().context("installing metrics recorder")?;

    println!("\n🎫 ============================================");
    println!("   Ticket Marketplace - Live Demo");
    println!("============================================\n");

    // a lost receipt should not stall the walkthrough for a full minute
    let config = Config::from_lookup(|key| {
        env::var(key)
            .ok()
            .or_else(|| (key == "LEDGER_CONFIRMATION_TIMEOUT_MS").then(|| "3000".to_string()))
    });
    tracing::debug!(config = %serde_json::to_string(&config)?, "Loaded configuration");
    let holder = Address::new(HOLDER);
    let organizer = Address::new(ORGANIZER);
    let collector = Address::new(COLLECTOR);

    let app = MarketplaceApp::new(&config, &holder).context("initializing marketplace")?;
    let reconciler = app.reconciler();

    // ========== Catalog ==========

    println!("📋 Events on sale:");
    for event in reconciler.events().await {
        println!(
            "   #{} {} ({}) - {} ETH, {}/{} left",
            event.id, event.name, event.category, event.price, event.available, event.max_supply
        );
    }
    println!();

    // ========== Organizer ==========

    println!("1️⃣  Organizer creates an event...");
    app.connect(&organizer);
    let spec = EventSpec::new("Rust Meetup London", 50, Price::parse("0.02")?, Price::parse("0.03")?)
        .with_location("Shoreditch, London")
        .with_category(Category::Conference);
    let event = reconciler.create_event(spec).await?;
    println!("   ✓ Event #{} created, resale window open: {}", event.id, event.resale_window_open);

    let event = reconciler.toggle_resale_window(event.id).await?;
    println!("   ✓ Resale window open: {}\n", event.resale_window_open);

    // ========== Primary sale ==========

    println!("2️⃣  Holder buys two tickets...");
    app.connect(&holder);
    let purchase = reconciler.buy_primary(event.id, 2).await?;
    for ticket in &purchase.tickets {
        println!("   ✓ Minted {}", ticket.id);
    }
    println!("   ✓ {} tickets left\n", purchase.event.available);

    // ========== Resale ==========

    let resale_id = purchase.tickets[0].id.clone();
    println!("3️⃣  Holder lists {resale_id} for resale...");
    let listed = reconciler.list_resale(&resale_id, Price::parse("0.025")?).await?;
    println!("   ✓ Listed at {} ETH", listed.asking_price.unwrap_or(event.price));

    match reconciler.list_resale(&resale_id, Price::parse("0.05")?).await {
        Err(err) => println!("   ✗ Listing above the ceiling refused: {err}"),
        Ok(_) => println!("   ! Listing above the ceiling was accepted"),
    }

    println!("   Collector buys it...");
    app.connect(&collector);
    let bought = reconciler.buy_resale(&resale_id).await?;
    println!("   ✓ {} now held by {}\n", bought.id, bought.owner);

    // ========== Gate ==========

    println!("4️⃣  Collector scans {resale_id} at the gate...");
    let verified = reconciler.verify(&resale_id).await?;
    println!("   ✓ Verified: {}", verified.verified);
    match reconciler.verify(&resale_id).await {
        Err(TicketingError::AlreadyVerified { ticket_id }) => {
            println!("   ℹ️  {ticket_id} was already verified");
        }
        other => println!("   ! Unexpected second scan result: {other:?}"),
    }
    println!();

    // ========== Lost confirmation ==========

    let stuck_id = purchase.tickets[1].id.clone();
    println!("5️⃣  Holder toggles resale on {stuck_id}, but the receipt never arrives...");
    app.connect(&holder);
    app.ledger().inject(Fault::NeverConfirm { applied: true });
    println!("   (waiting {} ms for the confirmation bound)", config.ledger.confirmation_timeout_ms);
    match reconciler.toggle_resale(&stuck_id).await {
        Err(err) => println!("   ✗ {err}"),
        Ok(_) => println!("   ! Confirmed after all"),
    }
    println!("   Resale state: {:?}", reconciler.resale_state(&stuck_id).await);
    println!("   Quarantined: {:?}", reconciler.quarantined().await);

    let report = app.reconcile().await;
    for (record, resolution) in &report.resolved {
        println!("   ✓ {record}: {}", resolution.as_str());
    }
    println!("   Resale state: {:?}\n", reconciler.resale_state(&stuck_id).await);

    // ========== Summary ==========

    println!("📦 Holdings:");
    for wallet in [&holder, &collector] {
        let tickets = reconciler.tickets_of(wallet).await;
        println!("   {wallet}: {} tickets", tickets.len());
    }
    println!("\n📈 Ledger transactions: {}", app.ledger().call_count());

    println!("\n📊 Metrics:\n{}", prometheus.render());
    Ok(())
}
