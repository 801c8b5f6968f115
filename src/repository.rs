//! Query objects over a [`Backend`] with mutation-driven cache invalidation.
//!
//! Reads are served from the cache when present. Each mutation drops (or,
//! for dossier modes, replaces) exactly the entries it can have changed, so
//! the next read goes back to the backend. There is no cross-session
//! coherence: a concurrent change by another user shows up on the next fetch.

use std::collections::HashMap;
use uuid::Uuid;

use crate::backend::Backend;
use crate::config::Actor;
use crate::error::Result;
use crate::model::{
    AllocationDetail, AllocationLine, CashSettlement, Dossier, InvoiceQuery, InvoiceSummary,
    NewCashSettlement, NewPayment, Payment, PaymentStatus,
};

pub struct Repository<B: Backend> {
    backend: B,
    invoices: HashMap<InvoiceQuery, Vec<InvoiceSummary>>,
    allocations: HashMap<Uuid, Vec<AllocationDetail>>,
    payments: HashMap<Option<Uuid>, Vec<Payment>>,
    dossiers: HashMap<Option<Uuid>, Vec<Dossier>>,
    modes: HashMap<Uuid, bool>,
    settlements: HashMap<Uuid, Vec<CashSettlement>>,
}

impl<B: Backend> Repository<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            invoices: HashMap::new(),
            allocations: HashMap::new(),
            payments: HashMap::new(),
            dossiers: HashMap::new(),
            modes: HashMap::new(),
            settlements: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // --- reads ---

    pub fn unpaid_invoices(&mut self, query: InvoiceQuery) -> Result<&[InvoiceSummary]> {
        if !self.invoices.contains_key(&query) {
            let fetched = self.backend.list_unpaid_invoices(&query)?;
            self.invoices.insert(query, fetched);
        }
        Ok(self.invoices.get(&query).map(Vec::as_slice).unwrap_or_default())
    }

    pub fn allocations(&mut self, payment_id: Uuid) -> Result<&[AllocationDetail]> {
        if !self.allocations.contains_key(&payment_id) {
            let fetched = self.backend.list_payment_allocations(payment_id)?;
            self.allocations.insert(payment_id, fetched);
        }
        Ok(self
            .allocations
            .get(&payment_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    pub fn payments(&mut self, customer_id: Option<Uuid>) -> Result<&[Payment]> {
        if !self.payments.contains_key(&customer_id) {
            let fetched = self.backend.list_payments(customer_id)?;
            self.payments.insert(customer_id, fetched);
        }
        Ok(self
            .payments
            .get(&customer_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Always fetched: the payment row is the source of truth for its status.
    pub fn payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.backend.get_payment(payment_id)
    }

    pub fn dossiers(&mut self, customer_id: Option<Uuid>) -> Result<&[Dossier]> {
        if !self.dossiers.contains_key(&customer_id) {
            let fetched = self.backend.list_dossiers(customer_id)?;
            self.dossiers.insert(customer_id, fetched);
        }
        Ok(self
            .dossiers
            .get(&customer_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    pub fn dossier_mode(&mut self, dossier_id: Uuid) -> Result<bool> {
        if let Some(manual) = self.modes.get(&dossier_id) {
            return Ok(*manual);
        }
        let manual = self.backend.get_dossier_mode(dossier_id)?;
        self.modes.insert(dossier_id, manual);
        Ok(manual)
    }

    pub fn cash_settlements(&mut self, dossier_id: Uuid) -> Result<&[CashSettlement]> {
        if !self.settlements.contains_key(&dossier_id) {
            let fetched = self.backend.list_cash_settlements(dossier_id)?;
            self.settlements.insert(dossier_id, fetched);
        }
        Ok(self
            .settlements
            .get(&dossier_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    // --- mutations ---

    pub fn create_payment(&mut self, payment: &NewPayment, actor: &Actor) -> Result<Payment> {
        let created = self.backend.create_payment(payment, actor)?;
        self.payments.clear();
        Ok(created)
    }

    pub fn update_payment_status(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        actor: &Actor,
    ) -> Result<()> {
        self.backend.update_payment_status(payment_id, status, actor)?;
        self.payments.clear();
        Ok(())
    }

    pub fn allocate_automatically(&mut self, payment_id: Uuid, actor: &Actor) -> Result<()> {
        let result = self.backend.allocate_automatically(payment_id, actor);
        // The procedure may have written rows before failing.
        self.invalidate_allocations(payment_id);
        result
    }

    pub fn create_manual_allocations(
        &mut self,
        payment_id: Uuid,
        lines: &[AllocationLine],
        actor: &Actor,
    ) -> Result<()> {
        let result = self.backend.create_manual_allocations(payment_id, lines, actor);
        self.invalidate_allocations(payment_id);
        result
    }

    pub fn delete_allocation(&mut self, allocation_id: Uuid, actor: &Actor) -> Result<()> {
        self.backend.delete_allocation(allocation_id, actor)?;
        // The owning payment is not known here, so every allocation list goes.
        self.allocations.clear();
        self.invoices.clear();
        Ok(())
    }

    pub fn set_dossier_mode(
        &mut self,
        dossier_id: Uuid,
        manual: bool,
        actor: &Actor,
    ) -> Result<()> {
        self.backend.set_dossier_mode(dossier_id, manual, actor)?;
        self.modes.insert(dossier_id, manual);
        self.dossiers.clear();
        Ok(())
    }

    pub fn record_cash_settlement(
        &mut self,
        settlement: &NewCashSettlement,
        actor: &Actor,
    ) -> Result<CashSettlement> {
        let created = self.backend.record_cash_settlement(settlement, actor)?;
        self.settlements.remove(&settlement.dossier_id);
        Ok(created)
    }

    pub fn delete_cash_settlement(&mut self, settlement_id: Uuid, actor: &Actor) -> Result<()> {
        self.backend.delete_cash_settlement(settlement_id, actor)?;
        self.settlements.clear();
        Ok(())
    }

    fn invalidate_allocations(&mut self, payment_id: Uuid) {
        self.allocations.remove(&payment_id);
        self.invoices.clear();
    }
}
