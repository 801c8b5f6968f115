use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{BillingError, Result};
use crate::model::{sort_for_display, AllocationLine, InvoiceSummary};
use crate::money::parse_amount;

/// Where a draft stands relative to the amount it distributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationState {
    Unallocated,
    Partial,
    Full,
    Over,
}

/// Manual allocation form state for one payment.
///
/// Entries are kept even when they fail validation, the way a form keeps
/// what was typed: the offending line is reported by [`set`](Self::set) and
/// by [`issues`](Self::issues), and blocks [`validate`](Self::validate).
/// `remaining_to_allocate` is always computed from the current entries.
#[derive(Debug, Clone)]
pub struct AllocationDraft {
    available: Decimal,
    candidates: Vec<InvoiceSummary>,
    entries: HashMap<Uuid, Decimal>,
}

impl AllocationDraft {
    /// `available` is the payment amount minus what is already allocated.
    pub fn new(available: Decimal, mut candidates: Vec<InvoiceSummary>) -> Self {
        candidates.retain(|invoice| invoice.remaining() > Decimal::ZERO);
        sort_for_display(&mut candidates);
        Self {
            available,
            candidates,
            entries: HashMap::new(),
        }
    }

    pub fn available(&self) -> Decimal {
        self.available
    }

    /// Open invoices in display order
    pub fn candidates(&self) -> &[InvoiceSummary] {
        &self.candidates
    }

    pub fn candidate(&self, reference: &str) -> Option<&InvoiceSummary> {
        self.candidates.iter().find(|i| i.matches(reference))
    }

    /// Enter an amount for an invoice. Zero clears the line.
    ///
    /// The entry is recorded even when it is out of bounds; the returned
    /// error says why it cannot be submitted.
    pub fn set(&mut self, invoice_id: Uuid, amount: Decimal) -> Result<()> {
        let invoice = self
            .candidates
            .iter()
            .find(|i| i.id == invoice_id)
            .ok_or_else(|| BillingError::UnknownInvoice(invoice_id.to_string()))?;

        if amount.is_zero() {
            self.entries.remove(&invoice_id);
            return Ok(());
        }

        let check = check_line(invoice, amount);
        self.entries.insert(invoice_id, amount);
        check
    }

    /// Same as [`set`](Self::set), addressing the invoice by number or id.
    pub fn set_by_reference(&mut self, reference: &str, amount: Decimal) -> Result<()> {
        let invoice_id = self
            .candidate(reference)
            .map(|i| i.id)
            .ok_or_else(|| BillingError::UnknownInvoice(reference.to_string()))?;
        self.set(invoice_id, amount)
    }

    pub fn amount_for(&self, invoice_id: Uuid) -> Decimal {
        self.entries.get(&invoice_id).copied().unwrap_or_default()
    }

    /// Sum of the entries, saturating at the `Decimal` bounds.
    pub fn allocated(&self) -> Decimal {
        self.entries
            .values()
            .fold(Decimal::ZERO, |sum, amount| sum.saturating_add(*amount))
    }

    /// `available - Σ entries`; negative means over-allocated.
    pub fn remaining_to_allocate(&self) -> Decimal {
        self.available.saturating_sub(self.allocated())
    }

    pub fn state(&self) -> AllocationState {
        let remaining = self.remaining_to_allocate();
        if remaining < Decimal::ZERO {
            AllocationState::Over
        } else if self.allocated().is_zero() {
            AllocationState::Unallocated
        } else if remaining.is_zero() {
            AllocationState::Full
        } else {
            AllocationState::Partial
        }
    }

    /// Everything currently blocking submission, line errors first.
    pub fn issues(&self) -> Vec<BillingError> {
        let mut issues: Vec<BillingError> = self
            .candidates
            .iter()
            .filter_map(|invoice| {
                let amount = self.entries.get(&invoice.id)?;
                check_line(invoice, *amount).err()
            })
            .collect();

        let remaining = self.remaining_to_allocate();
        if remaining < Decimal::ZERO {
            issues.push(BillingError::OverAllocated {
                excess: -remaining,
                remaining,
            });
        }
        if self.lines().is_empty() {
            issues.push(BillingError::NoAllocations);
        }
        issues
    }

    /// Positive entries in display order.
    pub fn lines(&self) -> Vec<AllocationLine> {
        self.candidates
            .iter()
            .filter_map(|invoice| {
                let amount = *self.entries.get(&invoice.id)?;
                (amount > Decimal::ZERO).then_some(AllocationLine {
                    invoice_id: invoice.id,
                    amount,
                })
            })
            .collect()
    }

    /// The submission gate: lines to send, or the first blocking issue.
    pub fn validate(&self) -> Result<Vec<AllocationLine>> {
        match self.issues().into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(self.lines()),
        }
    }
}

fn check_line(invoice: &InvoiceSummary, amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(BillingError::NegativeAllocation {
            invoice: invoice.number.clone(),
            amount,
        });
    }
    let remaining = invoice.remaining();
    if amount > remaining {
        return Err(BillingError::AllocationExceedsBalance {
            invoice: invoice.number.clone(),
            amount,
            remaining,
        });
    }
    Ok(())
}

/// Parse allocation input like "F-2026-0012:60.00" into (invoice reference, amount)
pub fn parse_allocation_input(input: &str) -> Result<(&str, Decimal)> {
    let (reference, amount) = input
        .rsplit_once(':')
        .ok_or_else(|| BillingError::InvalidAllocationFormat(input.to_string()))?;
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(BillingError::InvalidAllocationFormat(input.to_string()));
    }
    Ok((reference, parse_amount(amount)?))
}
