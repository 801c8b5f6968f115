use billing_admin::allocation::{self, AllocationPath, AllocationState};
use billing_admin::backend::{MemoryBackend, Operation};
use billing_admin::dossier;
use billing_admin::model::{
    AllocationMode, InvoiceQuery, InvoiceStatus, NewCashSettlement, NewPayment, PaymentMethod,
};
use billing_admin::{Actor, BillingError, Repository};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn operator() -> Actor {
    Actor::new("alice").unwrap()
}

struct Fixture {
    repo: Repository<MemoryBackend>,
    customer: Uuid,
    dossier: Uuid,
    older: Uuid,
    newer: Uuid,
}

/// One customer, one automatic dossier, two unpaid invoices of 60 and 80
fn fixture() -> Fixture {
    let backend = MemoryBackend::new();
    let customer = Uuid::new_v4();
    let dossier = backend.add_dossier("D-2026-001", customer, false);
    let newer = backend.add_invoice(
        "F-2026-0002",
        customer,
        Some(date("2026-09-30")),
        dec("80.00"),
        Decimal::ZERO,
    );
    let older = backend.add_invoice(
        "F-2026-0001",
        customer,
        Some(date("2026-08-31")),
        dec("60.00"),
        Decimal::ZERO,
    );
    Fixture {
        repo: Repository::new(backend),
        customer,
        dossier,
        older,
        newer,
    }
}

#[test]
fn test_automatic_dossier_allocates_on_creation() {
    let mut f = fixture();
    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Transfer);

    let created = allocation::create_payment(&mut f.repo, request, Some(f.dossier), &operator())
        .unwrap();

    assert_eq!(created.path, AllocationPath::Automatic);
    let backend = f.repo.backend();
    assert_eq!(backend.call_count(Operation::AllocateAutomatically), 1);
    assert_eq!(backend.invoice(f.older).unwrap().status(), InvoiceStatus::Paid);
    assert_eq!(backend.invoice(f.newer).unwrap().amount_paid, dec("40.00"));
}

#[test]
fn test_toggled_dossier_takes_the_manual_path() {
    let mut f = fixture();
    let actor = operator();

    assert_eq!(
        dossier::toggle(&mut f.repo, f.dossier, &actor).unwrap(),
        AllocationMode::Manual
    );
    assert_eq!(
        allocation::path_for(&mut f.repo, Some(f.dossier), true),
        AllocationPath::Manual
    );

    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Card);
    let created =
        allocation::create_payment(&mut f.repo, request, Some(f.dossier), &actor).unwrap();

    assert_eq!(created.path, AllocationPath::Manual);
    assert!(!created.payment.auto_allocate);
    assert_eq!(f.repo.backend().call_count(Operation::AllocateAutomatically), 0);
    assert!(f.repo.backend().allocations().is_empty());
}

#[test]
fn test_manual_partial_allocation_leaves_remainder() {
    let mut f = fixture();
    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Check);

    let (payment, lines) = allocation::create_payment_with_allocations(
        &mut f.repo,
        request,
        &[("F-2026-0001", dec("60.00"))],
        &operator(),
    )
    .unwrap();

    assert_eq!(lines.len(), 1);
    assert_eq!(f.repo.backend().invoice(f.older).unwrap().status(), InvoiceStatus::Paid);

    let stored = f.repo.backend().payments();
    assert!(!stored[0].auto_allocate);

    let payment = f.repo.payment(payment.id).unwrap();
    let draft = allocation::draft_for_payment(&mut f.repo, &payment).unwrap();
    assert_eq!(draft.remaining_to_allocate(), dec("40.00"));
    assert_eq!(draft.state(), AllocationState::Unallocated);
    // The settled invoice is no longer offered
    assert_eq!(draft.candidates().len(), 1);
    assert_eq!(draft.candidates()[0].id, f.newer);
}

#[test]
fn test_over_allocation_creates_nothing() {
    let mut f = fixture();
    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Transfer);

    let err = allocation::create_payment_with_allocations(
        &mut f.repo,
        request,
        &[("F-2026-0001", dec("150.00"))],
        &operator(),
    )
    .unwrap_err();

    assert!(matches!(err, BillingError::AllocationExceedsBalance { .. }));
    assert_eq!(f.repo.backend().call_count(Operation::CreatePayment), 0);
    assert!(f.repo.backend().payments().is_empty());
}

#[test]
fn test_sum_above_payment_is_blocked() {
    let mut f = fixture();
    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Transfer);

    let err = allocation::create_payment_with_allocations(
        &mut f.repo,
        request,
        &[("F-2026-0001", dec("60.00")), ("F-2026-0002", dec("50.00"))],
        &operator(),
    )
    .unwrap_err();

    assert!(matches!(err, BillingError::OverAllocated { .. }));
    assert_eq!(f.repo.backend().call_count(Operation::CreatePayment), 0);
}

#[test]
fn test_refused_allocation_batch_reports_the_created_payment() {
    let mut f = fixture();
    let actor = operator();
    f.repo
        .backend()
        .fail(Operation::CreateManualAllocations, "connection reset");
    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Transfer);

    let err = allocation::create_payment_with_allocations(
        &mut f.repo,
        request,
        &[("F-2026-0001", dec("60.00"))],
        &actor,
    )
    .unwrap_err();

    let stored = f.repo.backend().payments();
    assert_eq!(stored.len(), 1);
    let payment_id = match &err {
        BillingError::AllocationAfterCreate { payment, source } => {
            assert!(matches!(**source, BillingError::Backend { status: 503, .. }));
            *payment
        }
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(payment_id, stored[0].id);
    assert!(err.to_string().contains(&format!("billing allocate {payment_id}")));

    // Finishing on the recorded payment does not create a second one
    f.repo.backend().recover(Operation::CreateManualAllocations);
    let payment = f.repo.payment(payment_id).unwrap();
    let mut draft = allocation::draft_for_payment(&mut f.repo, &payment).unwrap();
    draft.set_by_reference("F-2026-0001", dec("60.00")).unwrap();
    allocation::submit(&mut f.repo, payment_id, &draft, &actor).unwrap();

    assert_eq!(f.repo.backend().payments().len(), 1);
    assert_eq!(f.repo.backend().call_count(Operation::CreatePayment), 1);
    assert_eq!(f.repo.backend().invoice(f.older).unwrap().status(), InvoiceStatus::Paid);
}

#[test]
fn test_failed_automatic_allocation_still_returns_payment() {
    let mut f = fixture();
    f.repo
        .backend()
        .fail(Operation::AllocateAutomatically, "procedure timed out");
    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Transfer);

    let created = allocation::create_payment(&mut f.repo, request, None, &operator()).unwrap();

    assert_eq!(created.path, AllocationPath::Automatic);
    assert_eq!(f.repo.backend().payments().len(), 1);
    assert!(f.repo.backend().allocations().is_empty());

    // The remainder can be handed over again once the backend recovers
    f.repo.backend().recover(Operation::AllocateAutomatically);
    let handed_over =
        allocation::allocate_remainder(&mut f.repo, created.payment.id, &operator()).unwrap();
    assert_eq!(handed_over, dec("100.00"));
    assert_eq!(f.repo.backend().allocations().len(), 2);
}

#[test]
fn test_failed_submit_keeps_draft_for_retry() {
    let mut f = fixture();
    let actor = operator();
    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Transfer)
        .with_auto_allocate(false);
    let created = allocation::create_payment(&mut f.repo, request, None, &actor).unwrap();

    let mut draft = allocation::draft_for_payment(&mut f.repo, &created.payment).unwrap();
    draft.set(f.older, dec("60.00")).unwrap();
    draft.set(f.newer, dec("40.00")).unwrap();
    assert_eq!(draft.state(), AllocationState::Full);

    f.repo
        .backend()
        .fail(Operation::CreateManualAllocations, "connection reset");
    let err = allocation::submit(&mut f.repo, created.payment.id, &draft, &actor).unwrap_err();
    assert!(matches!(err, BillingError::Backend { status: 503, .. }));
    assert!(f.repo.backend().allocations().is_empty());

    f.repo.backend().recover(Operation::CreateManualAllocations);
    let lines = allocation::submit(&mut f.repo, created.payment.id, &draft, &actor).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(f.repo.allocations(created.payment.id).unwrap().len(), 2);
}

#[test]
fn test_removing_an_allocation_does_not_reallocate() {
    let mut f = fixture();
    let actor = operator();
    let request = NewPayment::new(f.customer, dec("100.00"), PaymentMethod::Transfer);
    let created = allocation::create_payment(&mut f.repo, request, None, &actor).unwrap();

    let first = f.repo.allocations(created.payment.id).unwrap()[0].allocation.id;
    let before = f.repo.backend().call_count(Operation::AllocateAutomatically);
    allocation::remove_allocation(&mut f.repo, first, &actor).unwrap();

    assert_eq!(
        f.repo.backend().call_count(Operation::AllocateAutomatically),
        before
    );
    assert_eq!(f.repo.allocations(created.payment.id).unwrap().len(), 1);
    assert_eq!(f.repo.backend().invoice(f.older).unwrap().amount_paid, Decimal::ZERO);

    let payment = f.repo.payment(created.payment.id).unwrap();
    let draft = allocation::draft_for_payment(&mut f.repo, &payment).unwrap();
    assert_eq!(draft.remaining_to_allocate(), dec("60.00"));
}

#[test]
fn test_invoice_cache_refreshes_after_allocation() {
    let mut f = fixture();
    let query = InvoiceQuery::for_customer(f.customer);
    assert_eq!(f.repo.unpaid_invoices(query).unwrap().len(), 2);
    assert_eq!(f.repo.unpaid_invoices(query).unwrap().len(), 2);
    assert_eq!(f.repo.backend().call_count(Operation::ListUnpaidInvoices), 1);

    let request = NewPayment::new(f.customer, dec("60.00"), PaymentMethod::Cash);
    allocation::create_payment(&mut f.repo, request, None, &operator()).unwrap();

    let open = f.repo.unpaid_invoices(query).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, f.newer);
}

#[test]
fn test_cash_settlements_per_dossier() {
    let mut f = fixture();
    let actor = operator();
    let settlement = NewCashSettlement {
        dossier_id: f.dossier,
        amount: dec("25.00"),
        received_on: date("2026-10-01"),
        notes: Some("paid at the counter".to_string()),
    };
    settlement.validate().unwrap();

    let created = f.repo.record_cash_settlement(&settlement, &actor).unwrap();
    assert_eq!(created.recorded_by.as_deref(), Some("alice"));
    assert_eq!(f.repo.cash_settlements(f.dossier).unwrap().len(), 1);

    f.repo.delete_cash_settlement(created.id, &actor).unwrap();
    assert!(f.repo.cash_settlements(f.dossier).unwrap().is_empty());

    let empty = NewCashSettlement {
        amount: Decimal::ZERO,
        ..settlement
    };
    assert!(matches!(
        empty.validate(),
        Err(BillingError::InvalidSettlementAmount)
    ));
}
