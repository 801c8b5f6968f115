use rust_decimal::Decimal;
use uuid::Uuid;

use super::draft::AllocationDraft;
use crate::backend::Backend;
use crate::config::Actor;
use crate::dossier;
use crate::error::{BillingError, Result};
use crate::model::{AllocationLine, InvoiceQuery, NewPayment, Payment, PaymentStatus};
use crate::repository::Repository;

/// Which branch payment creation takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPath {
    /// One call: create, then let the backend distribute the amount.
    Automatic,
    /// Create unallocated and collect explicit per-invoice amounts.
    Manual,
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment: Payment,
    pub path: AllocationPath,
}

/// Manual when automatic allocation was not asked for, or the dossier is in manual mode.
pub fn path_for<B: Backend>(
    repo: &mut Repository<B>,
    dossier_id: Option<Uuid>,
    auto_requested: bool,
) -> AllocationPath {
    if !auto_requested {
        return AllocationPath::Manual;
    }
    match dossier_id {
        Some(id) if dossier::mode(repo, id).is_manual() => AllocationPath::Manual,
        _ => AllocationPath::Automatic,
    }
}

/// Create a payment, following the dossier gate.
///
/// On the automatic path a failure of the allocation procedure is logged
/// and the created payment is still returned, unallocated.
pub fn create_payment<B: Backend>(
    repo: &mut Repository<B>,
    request: NewPayment,
    dossier_id: Option<Uuid>,
    actor: &Actor,
) -> Result<CreatedPayment> {
    request.validate()?;
    let path = path_for(repo, dossier_id, request.auto_allocate);
    let request = request.with_auto_allocate(path == AllocationPath::Automatic);

    let payment = repo.create_payment(&request, actor)?;
    tracing::info!(payment = %payment.id, ?path, %actor, "payment created");

    if path == AllocationPath::Automatic {
        if let Err(e) = repo.allocate_automatically(payment.id, actor) {
            tracing::warn!(
                payment = %payment.id,
                error = %e,
                "automatic allocation failed; payment left unallocated"
            );
        }
    }

    Ok(CreatedPayment { payment, path })
}

/// Draft for an existing payment: its amount minus what is already allocated.
pub fn draft_for_payment<B: Backend>(
    repo: &mut Repository<B>,
    payment: &Payment,
) -> Result<AllocationDraft> {
    if payment.status == PaymentStatus::Cancelled {
        return Err(BillingError::PaymentCancelled(payment.id.to_string()));
    }

    let allocated: Decimal = repo
        .allocations(payment.id)?
        .iter()
        .map(|a| a.allocation.amount)
        .sum();
    let candidates = repo
        .unpaid_invoices(InvoiceQuery::for_customer(payment.customer_id))?
        .to_vec();

    Ok(AllocationDraft::new(payment.amount - allocated, candidates))
}

/// Draft for a payment that is not created yet.
pub fn draft_for_request<B: Backend>(
    repo: &mut Repository<B>,
    request: &NewPayment,
) -> Result<AllocationDraft> {
    request.validate()?;
    let candidates = repo
        .unpaid_invoices(InvoiceQuery::for_customer(request.customer_id))?
        .to_vec();
    Ok(AllocationDraft::new(request.amount, candidates))
}

/// Validate the draft and persist its lines as one batch.
///
/// Nothing is sent when validation fails. On a backend error the draft is
/// untouched and can be submitted again.
pub fn submit<B: Backend>(
    repo: &mut Repository<B>,
    payment_id: Uuid,
    draft: &AllocationDraft,
    actor: &Actor,
) -> Result<Vec<AllocationLine>> {
    let lines = draft.validate()?;
    repo.create_manual_allocations(payment_id, &lines, actor)?;
    tracing::info!(
        payment = %payment_id,
        lines = lines.len(),
        remaining = %draft.remaining_to_allocate(),
        "manual allocations saved"
    );
    Ok(lines)
}

/// Manual path in one step: the whole allocation set is validated before
/// the payment is created.
///
/// If the payment is created but the allocation batch is refused, the error
/// is [`BillingError::AllocationAfterCreate`] carrying the new payment id, so
/// the caller finishes with [`submit`] instead of creating the payment twice.
pub fn create_payment_with_allocations<B: Backend>(
    repo: &mut Repository<B>,
    request: NewPayment,
    entries: &[(&str, Decimal)],
    actor: &Actor,
) -> Result<(Payment, Vec<AllocationLine>)> {
    let mut draft = draft_for_request(repo, &request)?;
    for (reference, amount) in entries {
        draft.set_by_reference(reference, *amount)?;
    }
    draft.validate()?;

    let payment = repo.create_payment(&request.with_auto_allocate(false), actor)?;
    match submit(repo, payment.id, &draft, actor) {
        Ok(lines) => Ok((payment, lines)),
        Err(e) => {
            tracing::warn!(
                payment = %payment.id,
                error = %e,
                "payment created without its allocations"
            );
            Err(BillingError::AllocationAfterCreate {
                payment: payment.id,
                source: Box::new(e),
            })
        }
    }
}

/// Hand whatever is left of the payment to the backend's automatic procedure.
pub fn allocate_remainder<B: Backend>(
    repo: &mut Repository<B>,
    payment_id: Uuid,
    actor: &Actor,
) -> Result<Decimal> {
    let payment = repo.payment(payment_id)?;
    let draft = draft_for_payment(repo, &payment)?;
    let remaining = draft.remaining_to_allocate();
    if remaining <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    repo.allocate_automatically(payment_id, actor)?;
    Ok(remaining)
}

/// Delete one allocation. The freed amount is not redistributed.
pub fn remove_allocation<B: Backend>(
    repo: &mut Repository<B>,
    allocation_id: Uuid,
    actor: &Actor,
) -> Result<()> {
    repo.delete_allocation(allocation_id, actor)
}
