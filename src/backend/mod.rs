//! Remote collaborator surface.
//!
//! The allocation engine, balance bookkeeping and dossier mode storage all
//! live behind this trait. [`RestBackend`] talks to the real service;
//! [`MemoryBackend`] keeps the same contract in process.

mod memory;
mod rest;

pub use memory::{MemoryBackend, Operation};
pub use rest::RestBackend;

use uuid::Uuid;

use crate::config::Actor;
use crate::error::Result;
use crate::model::{
    AllocationDetail, AllocationLine, CashSettlement, Dossier, InvoiceQuery, InvoiceSummary,
    NewCashSettlement, NewPayment, Payment, PaymentStatus,
};

pub trait Backend {
    fn create_payment(&self, payment: &NewPayment, actor: &Actor) -> Result<Payment>;

    fn get_payment(&self, payment_id: Uuid) -> Result<Payment>;

    fn list_payments(&self, customer_id: Option<Uuid>) -> Result<Vec<Payment>>;

    fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        actor: &Actor,
    ) -> Result<()>;

    /// Distribution order and idempotency belong to the backend.
    fn allocate_automatically(&self, payment_id: Uuid, actor: &Actor) -> Result<()>;

    /// Persists all lines as a single batch insert.
    fn create_manual_allocations(
        &self,
        payment_id: Uuid,
        lines: &[AllocationLine],
        actor: &Actor,
    ) -> Result<()>;

    fn delete_allocation(&self, allocation_id: Uuid, actor: &Actor) -> Result<()>;

    fn list_payment_allocations(&self, payment_id: Uuid) -> Result<Vec<AllocationDetail>>;

    fn list_unpaid_invoices(&self, query: &InvoiceQuery) -> Result<Vec<InvoiceSummary>>;

    fn list_dossiers(&self, customer_id: Option<Uuid>) -> Result<Vec<Dossier>>;

    /// `true` when the dossier is in manual allocation mode.
    fn get_dossier_mode(&self, dossier_id: Uuid) -> Result<bool>;

    fn set_dossier_mode(&self, dossier_id: Uuid, manual: bool, actor: &Actor) -> Result<()>;

    fn record_cash_settlement(
        &self,
        settlement: &NewCashSettlement,
        actor: &Actor,
    ) -> Result<CashSettlement>;

    fn list_cash_settlements(&self, dossier_id: Uuid) -> Result<Vec<CashSettlement>>;

    fn delete_cash_settlement(&self, settlement_id: Uuid, actor: &Actor) -> Result<()>;
}
