//! # Marketplace
//!
//! Application shell for the ticket lifecycle engine.
//!
//! Wires the runtime's reconciler to a simulated ledger seeded with the demo
//! catalog, and exposes the environment-driven configuration used by the
//! `demo` binary.
//!
//! # Usage
//!
//! ```no_run
//! use marketplace::{Config, MarketplaceApp};
//! use ticket_ledger_core::types::Address;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let holder = Address::new("0xHolder");
//! let app = MarketplaceApp::new(&Config::from_env(), &holder)?;
//! app.connect(&holder);
//!
//! let events = app.reconciler().events().await;
//! println!("{} events on sale", events.len());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod fixtures;

pub use app::{AppError, MarketplaceApp};
pub use config::Config;
