use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::HashMap;
use uuid::Uuid;

use super::Backend;
use crate::config::Actor;
use crate::error::{BillingError, Result};
use crate::model::{
    sort_for_display, AllocatedInvoice, AllocatedPayment, AllocationDetail, AllocationLine,
    CashSettlement, Dossier, InvoiceQuery, InvoiceSummary, NewCashSettlement, NewPayment,
    Payment, PaymentAllocation, PaymentStatus,
};

/// Names of the backend calls, for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreatePayment,
    GetPayment,
    ListPayments,
    UpdatePaymentStatus,
    AllocateAutomatically,
    CreateManualAllocations,
    DeleteAllocation,
    ListPaymentAllocations,
    ListUnpaidInvoices,
    ListDossiers,
    GetDossierMode,
    SetDossierMode,
    RecordCashSettlement,
    ListCashSettlements,
    DeleteCashSettlement,
}

#[derive(Default)]
struct State {
    payments: Vec<Payment>,
    invoices: Vec<InvoiceSummary>,
    allocations: Vec<PaymentAllocation>,
    dossiers: Vec<Dossier>,
    settlements: Vec<CashSettlement>,
    calls: Vec<Operation>,
    failures: HashMap<Operation, String>,
}

impl State {
    fn allocated_for_payment(&self, payment_id: Uuid) -> Decimal {
        self.allocations
            .iter()
            .filter(|a| a.payment_id == payment_id)
            .map(|a| a.amount)
            .sum()
    }

    fn payment(&self, payment_id: Uuid) -> Result<&Payment> {
        self.payments
            .iter()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| not_found(format!("payment {payment_id} does not exist")))
    }

    fn invoice_mut(&mut self, invoice_id: Uuid) -> Result<&mut InvoiceSummary> {
        self.invoices
            .iter_mut()
            .find(|i| i.id == invoice_id)
            .ok_or_else(|| not_found(format!("invoice {invoice_id} does not exist")))
    }

    fn dossier_mut(&mut self, dossier_id: Uuid) -> Result<&mut Dossier> {
        self.dossiers
            .iter_mut()
            .find(|d| d.id == dossier_id)
            .ok_or_else(|| not_found(format!("dossier {dossier_id} does not exist")))
    }

    fn push_allocation(
        &mut self,
        payment_id: Uuid,
        invoice_id: Uuid,
        amount: Decimal,
        actor: &Actor,
    ) -> Result<()> {
        self.invoice_mut(invoice_id)?.amount_paid += amount;
        self.allocations.push(PaymentAllocation {
            id: Uuid::new_v4(),
            payment_id,
            invoice_id,
            amount,
            created_by: Some(actor.to_string()),
            created_at: Some(Utc::now()),
        });
        Ok(())
    }
}

/// In-process backend with the same contract as the REST service.
///
/// It enforces the balance constraints the real database enforces and pins
/// automatic allocation to oldest due date first, then invoice number. Every
/// call is logged, and any operation can be made to fail with a message.
#[derive(Default)]
pub struct MemoryBackend {
    state: RefCell<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_invoice(
        &self,
        number: &str,
        customer_id: Uuid,
        due_date: Option<NaiveDate>,
        amount_total: Decimal,
        amount_paid: Decimal,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.state.borrow_mut().invoices.push(InvoiceSummary {
            id,
            number: number.to_string(),
            customer_id,
            customer_name: None,
            due_date,
            amount_total,
            amount_paid,
        });
        id
    }

    pub fn add_dossier(&self, reference: &str, customer_id: Uuid, manual: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.state.borrow_mut().dossiers.push(Dossier {
            id,
            reference: reference.to_string(),
            customer_id: Some(customer_id),
            manual_allocation: manual,
            mode_changed_by: None,
            mode_changed_at: None,
        });
        id
    }

    /// Make every later `operation` call fail with `message` until [`recover`](Self::recover).
    pub fn fail(&self, operation: Operation, message: &str) {
        self.state
            .borrow_mut()
            .failures
            .insert(operation, message.to_string());
    }

    pub fn recover(&self, operation: Operation) {
        self.state.borrow_mut().failures.remove(&operation);
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.state.borrow().calls.clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    pub fn invoice(&self, invoice_id: Uuid) -> Option<InvoiceSummary> {
        self.state
            .borrow()
            .invoices
            .iter()
            .find(|i| i.id == invoice_id)
            .cloned()
    }

    pub fn allocations(&self) -> Vec<PaymentAllocation> {
        self.state.borrow().allocations.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.state.borrow().payments.clone()
    }

    fn begin(&self, operation: Operation) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(operation);
        match state.failures.get(&operation) {
            Some(message) => Err(BillingError::Backend {
                status: 503,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn not_found(message: String) -> BillingError {
    BillingError::Backend {
        status: 404,
        message,
    }
}

fn rejected(message: String) -> BillingError {
    BillingError::Backend {
        status: 400,
        message,
    }
}

impl Backend for MemoryBackend {
    fn create_payment(&self, payment: &NewPayment, actor: &Actor) -> Result<Payment> {
        self.begin(Operation::CreatePayment)?;
        if payment.amount <= Decimal::ZERO {
            return Err(rejected("payment amount must be positive".to_string()));
        }

        let created = Payment {
            id: Uuid::new_v4(),
            customer_id: payment.customer_id,
            amount: payment.amount,
            method: payment.method,
            status: PaymentStatus::Completed,
            reference: payment.reference.clone(),
            notes: payment.notes.clone(),
            auto_allocate: payment.auto_allocate,
            payment_date: payment.payment_date,
            created_by: Some(actor.to_string()),
            created_at: Some(Utc::now()),
        };
        self.state.borrow_mut().payments.push(created.clone());
        Ok(created)
    }

    fn get_payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.begin(Operation::GetPayment)?;
        self.state
            .borrow()
            .payments
            .iter()
            .find(|p| p.id == payment_id)
            .cloned()
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))
    }

    fn list_payments(&self, customer_id: Option<Uuid>) -> Result<Vec<Payment>> {
        self.begin(Operation::ListPayments)?;
        let mut payments: Vec<Payment> = self
            .state
            .borrow()
            .payments
            .iter()
            .filter(|p| customer_id.map_or(true, |c| p.customer_id == c))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(payments)
    }

    fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        _actor: &Actor,
    ) -> Result<()> {
        self.begin(Operation::UpdatePaymentStatus)?;
        let mut state = self.state.borrow_mut();
        let payment = state
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))?;
        payment.status = status;
        Ok(())
    }

    fn allocate_automatically(&self, payment_id: Uuid, actor: &Actor) -> Result<()> {
        self.begin(Operation::AllocateAutomatically)?;
        let mut state = self.state.borrow_mut();
        let payment = state.payment(payment_id)?.clone();
        if payment.status == PaymentStatus::Cancelled {
            return Err(rejected(format!("payment {payment_id} is cancelled")));
        }

        let mut left = payment.amount - state.allocated_for_payment(payment_id);
        let mut open: Vec<InvoiceSummary> = state
            .invoices
            .iter()
            .filter(|i| InvoiceQuery::for_customer(payment.customer_id).admits(i))
            .cloned()
            .collect();
        sort_for_display(&mut open);

        for invoice in open {
            if left <= Decimal::ZERO {
                break;
            }
            let amount = left.min(invoice.remaining());
            state.push_allocation(payment_id, invoice.id, amount, actor)?;
            left -= amount;
        }
        Ok(())
    }

    fn create_manual_allocations(
        &self,
        payment_id: Uuid,
        lines: &[AllocationLine],
        actor: &Actor,
    ) -> Result<()> {
        self.begin(Operation::CreateManualAllocations)?;
        let mut state = self.state.borrow_mut();
        let payment = state.payment(payment_id)?.clone();

        let requested: Decimal = lines.iter().map(|l| l.amount).sum();
        if state.allocated_for_payment(payment_id) + requested > payment.amount {
            return Err(rejected(format!(
                "allocations exceed payment {payment_id} amount"
            )));
        }
        for line in lines {
            let invoice = state.invoice_mut(line.invoice_id)?;
            if line.amount <= Decimal::ZERO || line.amount > invoice.remaining() {
                return Err(rejected(format!(
                    "allocation of {} exceeds balance of invoice {}",
                    line.amount, invoice.number
                )));
            }
        }

        for line in lines {
            state.push_allocation(payment_id, line.invoice_id, line.amount, actor)?;
        }
        Ok(())
    }

    fn delete_allocation(&self, allocation_id: Uuid, _actor: &Actor) -> Result<()> {
        self.begin(Operation::DeleteAllocation)?;
        let mut state = self.state.borrow_mut();
        let index = state
            .allocations
            .iter()
            .position(|a| a.id == allocation_id)
            .ok_or_else(|| BillingError::AllocationNotFound(allocation_id.to_string()))?;
        let removed = state.allocations.remove(index);
        let invoice = state.invoice_mut(removed.invoice_id)?;
        invoice.amount_paid = (invoice.amount_paid - removed.amount).max(Decimal::ZERO);
        Ok(())
    }

    fn list_payment_allocations(&self, payment_id: Uuid) -> Result<Vec<AllocationDetail>> {
        self.begin(Operation::ListPaymentAllocations)?;
        let state = self.state.borrow();
        let payment = state.payments.iter().find(|p| p.id == payment_id);

        let details = state
            .allocations
            .iter()
            .filter(|a| a.payment_id == payment_id)
            .map(|a| AllocationDetail {
                allocation: a.clone(),
                invoice: state
                    .invoices
                    .iter()
                    .find(|i| i.id == a.invoice_id)
                    .map(|i| AllocatedInvoice {
                        number: i.number.clone(),
                        amount_total: i.amount_total,
                        amount_paid: i.amount_paid,
                        due_date: i.due_date,
                    }),
                payment: payment.map(|p| AllocatedPayment {
                    amount: p.amount,
                    method: p.method,
                    payment_date: p.payment_date,
                }),
            })
            .collect();
        Ok(details)
    }

    fn list_unpaid_invoices(&self, query: &InvoiceQuery) -> Result<Vec<InvoiceSummary>> {
        self.begin(Operation::ListUnpaidInvoices)?;
        Ok(self
            .state
            .borrow()
            .invoices
            .iter()
            .filter(|i| query.admits(i))
            .cloned()
            .collect())
    }

    fn list_dossiers(&self, customer_id: Option<Uuid>) -> Result<Vec<Dossier>> {
        self.begin(Operation::ListDossiers)?;
        let mut dossiers: Vec<Dossier> = self
            .state
            .borrow()
            .dossiers
            .iter()
            .filter(|d| customer_id.map_or(true, |c| d.customer_id == Some(c)))
            .cloned()
            .collect();
        dossiers.sort_by(|a, b| a.reference.cmp(&b.reference));
        Ok(dossiers)
    }

    fn get_dossier_mode(&self, dossier_id: Uuid) -> Result<bool> {
        self.begin(Operation::GetDossierMode)?;
        Ok(self.state.borrow_mut().dossier_mut(dossier_id)?.manual_allocation)
    }

    fn set_dossier_mode(&self, dossier_id: Uuid, manual: bool, actor: &Actor) -> Result<()> {
        self.begin(Operation::SetDossierMode)?;
        let mut state = self.state.borrow_mut();
        let dossier = state.dossier_mut(dossier_id)?;
        dossier.manual_allocation = manual;
        dossier.mode_changed_by = Some(actor.to_string());
        dossier.mode_changed_at = Some(Utc::now());
        Ok(())
    }

    fn record_cash_settlement(
        &self,
        settlement: &NewCashSettlement,
        actor: &Actor,
    ) -> Result<CashSettlement> {
        self.begin(Operation::RecordCashSettlement)?;
        let mut state = self.state.borrow_mut();
        state.dossier_mut(settlement.dossier_id)?;

        let created = CashSettlement {
            id: Uuid::new_v4(),
            dossier_id: settlement.dossier_id,
            amount: settlement.amount,
            received_on: settlement.received_on,
            notes: settlement.notes.clone(),
            recorded_by: Some(actor.to_string()),
            created_at: Some(Utc::now()),
        };
        state.settlements.push(created.clone());
        Ok(created)
    }

    fn list_cash_settlements(&self, dossier_id: Uuid) -> Result<Vec<CashSettlement>> {
        self.begin(Operation::ListCashSettlements)?;
        let mut settlements: Vec<CashSettlement> = self
            .state
            .borrow()
            .settlements
            .iter()
            .filter(|s| s.dossier_id == dossier_id)
            .cloned()
            .collect();
        settlements.sort_by(|a, b| b.received_on.cmp(&a.received_on));
        Ok(settlements)
    }

    fn delete_cash_settlement(&self, settlement_id: Uuid, _actor: &Actor) -> Result<()> {
        self.begin(Operation::DeleteCashSettlement)?;
        let mut state = self.state.borrow_mut();
        let before = state.settlements.len();
        state.settlements.retain(|s| s.id != settlement_id);
        if state.settlements.len() == before {
            return Err(not_found(format!("cash settlement {settlement_id} does not exist")));
        }
        Ok(())
    }
}
