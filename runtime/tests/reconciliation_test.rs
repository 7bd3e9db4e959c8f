//! Rollback and quarantine integration tests.
//!
//! Injects ledger faults under each operation and checks that a revert
//! restores the prior local state exactly, while a missing confirmation
//! quarantines the record until a ledger read resolves it.
//!
//! Run with: `cargo test --test reconciliation_test`

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{BUYER, HOLDER, ORGANIZER, RIVAL, price, seeded, test_event, test_ticket};
use ticket_ledger_core::error::TicketingError;
use ticket_ledger_core::ledger::RevertReason;
use ticket_ledger_core::sync::{EventOp, RecordKey, SyncState, TicketOp};
use ticket_ledger_core::types::{Address, EventId, EventSpec, ResaleState, TicketId};
use ticket_ledger_runtime::Resolution;
use ticket_ledger_testing::{Fault, InMemoryLedger};

// ============================================================================
// Reverts roll back exactly
// ============================================================================

#[tokio::test]
async fn test_reverted_primary_sale_restores_supply() {
    let (ledger, reconciler) = seeded(BUYER, &[]);
    let event_id = test_event(true).id;
    let before = reconciler.event(event_id).await.unwrap();
    ledger.inject(Fault::Revert(RevertReason::SoldOut { event_id, requested: 2, available: 0 }));

    let err = reconciler.buy_primary(event_id, 2).await.unwrap_err();
    assert!(matches!(err, TicketingError::RemoteRejected { .. }));
    assert!(err.leaves_state_unchanged());
    assert_eq!(reconciler.event(event_id).await.unwrap(), before);
    assert!(reconciler.tickets_of(&Address::new(BUYER)).await.is_empty());
}

#[tokio::test]
async fn test_reverted_resale_purchase_restores_listing() {
    let tickets = [test_ticket("T-001", HOLDER, Some("0.12"))];
    let (ledger, buyer) = seeded(BUYER, &tickets);
    let ticket_id = TicketId::new("T-001");
    let before = buyer.ticket(&ticket_id).await.unwrap();
    ledger.inject(Fault::Revert(RevertReason::NotListed { ticket_id: ticket_id.clone() }));

    let err = buyer.buy_resale(&ticket_id).await.unwrap_err();
    assert!(matches!(err, TicketingError::RemoteRejected { .. }));
    assert_eq!(buyer.ticket(&ticket_id).await.unwrap(), before);
    assert_eq!(buyer.resale_state(&ticket_id).await, Some(ResaleState::Active));
}

#[tokio::test]
async fn test_ledger_ceiling_breach_surfaces_as_price_error() {
    // local ceiling is looser than the ledger's
    let ledger = InMemoryLedger::new().shared();
    let mut strict = test_event(true);
    strict.max_resale_price = price("0.11");
    let tickets = [test_ticket("T-001", HOLDER, None)];
    common::seed_ledger(&ledger, &[strict], &tickets);
    let reconciler = common::reconciler(&ledger, HOLDER, &[test_event(true)], &tickets);
    let ticket_id = TicketId::new("T-001");

    let err = reconciler.list_resale(&ticket_id, price("0.14")).await.unwrap_err();
    assert_eq!(
        err,
        TicketingError::PriceExceedsCeiling { price: price("0.14"), ceiling: price("0.11") }
    );
    let ticket = reconciler.ticket(&ticket_id).await.unwrap();
    assert!(!ticket.resale_active);
    assert_eq!(ticket.asking_price, None);
}

#[tokio::test]
async fn test_transport_failure_rolls_back() {
    let tickets = [test_ticket("T-001", HOLDER, Some("0.12"))];
    let (ledger, buyer) = seeded(BUYER, &tickets);
    let ticket_id = TicketId::new("T-001");
    ledger.inject(Fault::TransportFailure);

    let err = buyer.buy_resale(&ticket_id).await.unwrap_err();
    assert!(matches!(err, TicketingError::Transport(_)));
    assert!(err.is_retryable());

    let ticket = buyer.ticket(&ticket_id).await.unwrap();
    assert_eq!(ticket.owner, Address::new(HOLDER));
    assert!(ticket.sync.is_synced());
    assert_eq!(ledger.ticket_snapshot(&ticket_id).unwrap().owner, Address::new(HOLDER));

    // nothing landed, so a retry goes through
    let ticket = buyer.buy_resale(&ticket_id).await.unwrap();
    assert_eq!(ticket.owner, Address::new(BUYER));
}

// ============================================================================
// Timeouts quarantine until reconciled
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_toggle_quarantines_ticket() {
    let (ledger, holder) = seeded(HOLDER, &[test_ticket("T-001", HOLDER, None)]);
    let ticket_id = TicketId::new("T-001");
    ledger.inject(Fault::NeverConfirm { applied: true });

    let err = holder.toggle_resale(&ticket_id).await.unwrap_err();
    assert!(matches!(
        &err,
        TicketingError::Timeout { record, tx_hash: Some(_), .. } if *record == RecordKey::Ticket(ticket_id.clone())
    ));
    assert!(!err.leaves_state_unchanged());

    assert_eq!(holder.resale_state(&ticket_id).await, Some(ResaleState::Unknown));
    assert!(!holder.is_resale_active(&ticket_id).await);
    assert_eq!(holder.quarantined().await, vec![RecordKey::Ticket(ticket_id.clone())]);

    let calls_before = ledger.call_count();
    let err = holder.toggle_resale(&ticket_id).await.unwrap_err();
    assert!(matches!(err, TicketingError::ConflictPending { .. }));
    assert_eq!(ledger.call_count(), calls_before);

    let resolution = holder.reconcile_ticket(&ticket_id).await.unwrap();
    assert_eq!(resolution, Resolution::Finalized);
    assert_eq!(holder.resale_state(&ticket_id).await, Some(ResaleState::Active));
    assert_eq!(holder.ticket(&ticket_id).await.unwrap().asking_price, Some(price("0.1")));
    assert!(holder.quarantined().await.is_empty());

    assert_eq!(holder.reconcile_ticket(&ticket_id).await.unwrap(), Resolution::AlreadySynced);
}

#[tokio::test(start_paused = true)]
async fn test_unapplied_toggle_rolls_back_on_reconcile() {
    let (ledger, holder) = seeded(HOLDER, &[test_ticket("T-001", HOLDER, None)]);
    let ticket_id = TicketId::new("T-001");
    ledger.inject(Fault::NeverConfirm { applied: false });

    holder.toggle_resale(&ticket_id).await.unwrap_err();
    let ticket = holder.ticket(&ticket_id).await.unwrap();
    assert!(matches!(
        ticket.sync,
        SyncState::Unknown { op: TicketOp::ResaleToggle { previous_active: false, .. }, .. }
    ));

    assert_eq!(holder.reconcile_ticket(&ticket_id).await.unwrap(), Resolution::RolledBack);
    let ticket = holder.ticket(&ticket_id).await.unwrap();
    assert_eq!(ticket.resale_state(), ResaleState::Inactive);
    assert_eq!(ticket.asking_price, None);
    assert!(ticket.sync.is_synced());
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_verification_resolves_verified() {
    let (ledger, holder) = seeded(HOLDER, &[test_ticket("T-001", HOLDER, Some("0.12"))]);
    let ticket_id = TicketId::new("T-001");
    ledger.inject(Fault::NeverConfirm { applied: true });

    let err = holder.verify(&ticket_id).await.unwrap_err();
    assert!(matches!(err, TicketingError::Timeout { .. }));
    assert!(!holder.is_ticket_verified(&ticket_id).await);

    assert_eq!(holder.reconcile_ticket(&ticket_id).await.unwrap(), Resolution::Finalized);
    assert!(holder.is_ticket_verified(&ticket_id).await);
    assert!(!holder.is_resale_active(&ticket_id).await);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_primary_sale_mints_on_reconcile() {
    let (ledger, buyer) = seeded(BUYER, &[]);
    let event_id = test_event(true).id;
    ledger.inject(Fault::NeverConfirm { applied: true });

    let err = buyer.buy_primary(event_id, 2).await.unwrap_err();
    assert!(matches!(err, TicketingError::Timeout { .. }));
    let event = buyer.event(event_id).await.unwrap();
    assert_eq!(event.available, 8);
    assert!(matches!(event.sync, SyncState::Unknown { op: EventOp::PrimarySale { quantity: 2, .. }, .. }));
    assert!(buyer.tickets_of(&Address::new(BUYER)).await.is_empty());

    assert_eq!(buyer.reconcile_event(event_id).await.unwrap(), Resolution::Finalized);
    let event = buyer.event(event_id).await.unwrap();
    assert_eq!(event.available, 8);
    assert!(event.sync.is_synced());
    assert_eq!(buyer.tickets_of(&Address::new(BUYER)).await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unapplied_primary_sale_restores_supply_on_reconcile() {
    let (ledger, buyer) = seeded(BUYER, &[]);
    let event_id = test_event(true).id;
    ledger.inject(Fault::NeverConfirm { applied: false });

    buyer.buy_primary(event_id, 3).await.unwrap_err();
    assert_eq!(buyer.event(event_id).await.unwrap().available, 7);

    assert_eq!(buyer.reconcile_event(event_id).await.unwrap(), Resolution::RolledBack);
    assert_eq!(buyer.event(event_id).await.unwrap().available, 10);
    assert!(buyer.tickets_of(&Address::new(BUYER)).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_creation_resolved_either_way() {
    let ledger = InMemoryLedger::new().shared();
    let reconciler = common::reconciler(&ledger, ORGANIZER, &[], &[]);
    let spec = EventSpec::new("Test", 10, price("0.1"), price("0.15"));

    ledger.inject(Fault::NeverConfirm { applied: false });
    reconciler.create_event(spec.clone()).await.unwrap_err();
    let pending = reconciler.events().await;
    assert_eq!(pending.len(), 1);
    assert!(pending[0].sync.is_unknown());

    assert_eq!(reconciler.reconcile_event(pending[0].id).await.unwrap(), Resolution::RolledBack);
    assert!(reconciler.events().await.is_empty());

    ledger.inject(Fault::NeverConfirm { applied: true });
    reconciler.create_event(spec).await.unwrap_err();
    let event_id = reconciler.events().await[0].id;
    assert_eq!(reconciler.reconcile_event(event_id).await.unwrap(), Resolution::Finalized);
    let event = reconciler.event(event_id).await.unwrap();
    assert!(event.sync.is_synced());
    assert_eq!(ledger.event_snapshot(event_id).unwrap().creator, Address::new(ORGANIZER));
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_creation_found_under_ledger_id() {
    let ledger = InMemoryLedger::new().shared();
    let rival = common::reconciler(&ledger, RIVAL, &[], &[]);
    let organizer = common::reconciler(&ledger, ORGANIZER, &[], &[]);

    let other = rival.create_event(EventSpec::new("Other", 5, price("0.1"), price("0.15"))).await.unwrap();
    assert_eq!(other.id, EventId::new(1));

    ledger.inject(Fault::NeverConfirm { applied: true });
    organizer
        .create_event(EventSpec::new("Mine", 10, price("0.1"), price("0.15")))
        .await
        .unwrap_err();
    let provisional = organizer.events().await[0].id;
    assert_eq!(provisional, EventId::new(1));
    assert_eq!(ledger.event_snapshot(EventId::new(2)).unwrap().name, "Mine");

    assert_eq!(organizer.reconcile_event(provisional).await.unwrap(), Resolution::Finalized);
    let events = organizer.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, EventId::new(2));
    assert_eq!(events[0].name, "Mine");
    assert!(events[0].sync.is_synced());

    organizer.gateway().initialize(ticket_ledger_testing::LocalSigner::shared(BUYER));
    let purchase = organizer.buy_primary(EventId::new(2), 1).await.unwrap();
    assert_eq!(purchase.event.available, 9);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_retry_displaces_dropped_creation() {
    let ledger = InMemoryLedger::new().shared();
    let organizer = common::reconciler(&ledger, ORGANIZER, &[], &[]);
    let spec = EventSpec::new("Mine", 10, price("0.1"), price("0.15"));

    ledger.inject(Fault::NeverConfirm { applied: false });
    organizer.create_event(spec.clone()).await.unwrap_err();

    let retried = organizer.create_event(spec).await.unwrap();
    assert_eq!(retried.id, EventId::new(1));
    assert!(retried.sync.is_synced());
    assert_eq!(ledger.event_snapshot(EventId::new(1)).unwrap().name, "Mine");

    assert_eq!(organizer.quarantined().await.len(), 1);
    let dropped = organizer.events().await.into_iter().find(|event| event.sync.is_unknown()).unwrap().id;
    assert_ne!(dropped, EventId::new(1));

    assert_eq!(organizer.reconcile_event(dropped).await.unwrap(), Resolution::RolledBack);
    let events = organizer.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, EventId::new(1));

    organizer.gateway().initialize(ticket_ledger_testing::LocalSigner::shared(BUYER));
    assert!(organizer.buy_primary(EventId::new(1), 1).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_window_toggle_finalizes() {
    let (ledger, organizer) = seeded(ORGANIZER, &[]);
    let event_id = test_event(true).id;
    ledger.inject(Fault::NeverConfirm { applied: true });

    organizer.toggle_resale_window(event_id).await.unwrap_err();
    assert_eq!(organizer.reconcile_event(event_id).await.unwrap(), Resolution::Finalized);
    assert!(!organizer.event(event_id).await.unwrap().resale_window_open);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_all_keeps_unreachable_records_quarantined() {
    let (ledger, holder) = seeded(HOLDER, &[test_ticket("T-001", HOLDER, None)]);
    let ticket_id = TicketId::new("T-001");
    ledger.inject(Fault::NeverConfirm { applied: true });
    holder.toggle_resale(&ticket_id).await.unwrap_err();

    ledger.fail_reads(1);
    let report = holder.reconcile_all().await;
    assert!(!report.is_clean());
    assert!(report.resolved.is_empty());
    assert!(matches!(report.failed[0].1, TicketingError::Transport(_)));
    assert_eq!(holder.resale_state(&ticket_id).await, Some(ResaleState::Unknown));

    let report = holder.reconcile_all().await;
    assert!(report.is_clean());
    assert_eq!(report.resolved, vec![(RecordKey::Ticket(ticket_id.clone()), Resolution::Finalized)]);
    assert_eq!(holder.resale_state(&ticket_id).await, Some(ResaleState::Active));
}

#[tokio::test]
async fn test_reconcile_rejects_pending_and_unknown_records() {
    let (_ledger, holder) = seeded(HOLDER, &[test_ticket("T-001", HOLDER, None)]);

    assert_eq!(holder.reconcile_ticket(&TicketId::new("T-001")).await.unwrap(), Resolution::AlreadySynced);
    let err = holder.reconcile_ticket(&TicketId::new("T-999")).await.unwrap_err();
    assert!(matches!(err, TicketingError::InvalidParameters { .. }));
}
