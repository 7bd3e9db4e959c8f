//! Application wiring: simulated ledger, gateway and reconciler.

use crate::config::Config;
use crate::fixtures;
use std::sync::Arc;
use thiserror::Error;
use ticket_ledger_core::environment::SystemClock;
use ticket_ledger_core::error::TicketingError;
use ticket_ledger_core::types::Address;
use ticket_ledger_runtime::{ContractGateway, ReconciliationReport, Reconciler};
use ticket_ledger_testing::{InMemoryLedger, LocalSigner};

/// Application errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Fixture data was rejected while seeding
    #[error("Fixture error: {0}")]
    Fixtures(#[from] TicketingError),
}

/// The marketplace over a simulated ledger.
///
/// Owns the ledger so the demo can inject faults, and a single reconciler
/// whose acting wallet is whichever one was last [`connect`](Self::connect)ed.
pub struct MarketplaceApp {
    ledger: Arc<InMemoryLedger>,
    reconciler: Arc<Reconciler>,
}

impl MarketplaceApp {
    /// Builds the app and seeds the demo catalog, with the demo tickets held
    /// by `holder`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Fixtures`] if the fixture data is rejected.
    pub fn new(config: &Config, holder: &Address) -> Result<Self, AppError> {
        let contract = Address::new(&config.contract_address);
        // in-process stand-in for the ledger RPC transport
        let ledger = InMemoryLedger::new()
            .with_contract(contract.clone())
            .with_latency(config.demo_latency())
            .shared();

        let events = fixtures::demo_events()?;
        let tickets = fixtures::demo_tickets(holder);
        fixtures::seed_ledger(&ledger, &events, &tickets);
        let (catalog, registry) = fixtures::registries(&events, &tickets)?;

        let runtime = config.runtime();
        let gateway = Arc::new(ContractGateway::new(ledger.clone(), contract, &runtime));
        let reconciler = Arc::new(Reconciler::new(
            gateway,
            catalog,
            registry,
            Arc::new(SystemClock),
            &runtime,
        ));

        tracing::info!(
            contract = %config.contract_address,
            events = events.len(),
            tickets = tickets.len(),
            "Marketplace initialized"
        );
        Ok(Self { ledger, reconciler })
    }

    /// Binds `wallet` as the acting identity for subsequent operations.
    pub fn connect(&self, wallet: &Address) {
        self.reconciler.gateway().initialize(LocalSigner::shared(wallet.as_str()));
        tracing::info!(wallet = %wallet, "Wallet connected");
    }

    /// Currently connected wallet
    #[must_use]
    pub fn wallet(&self) -> Option<Address> {
        self.reconciler.gateway().signer_address()
    }

    /// The reconciler all operations go through
    #[must_use]
    pub const fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// The simulated ledger
    #[must_use]
    pub const fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }

    /// Resolves every quarantined record, logging what is still stuck.
    pub async fn reconcile(&self) -> ReconciliationReport {
        let report = self.reconciler.reconcile_all().await;
        if report.is_clean() {
            tracing::info!(resolved = report.resolved.len(), "Reconciliation complete");
        } else {
            tracing::warn!(
                resolved = report.resolved.len(),
                failed = report.failed.len(),
                "Reconciliation left records quarantined"
            );
        }
        report
    }
}
