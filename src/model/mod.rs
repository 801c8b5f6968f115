mod allocation;
mod cash;
mod dossier;
mod invoice;
mod payment;

pub use allocation::{
    AllocatedInvoice, AllocatedPayment, AllocationDetail, AllocationLine, PaymentAllocation,
};
pub use cash::{CashSettlement, NewCashSettlement};
pub use dossier::{AllocationMode, Dossier};
pub use invoice::{sort_for_display, InvoiceQuery, InvoiceStatus, InvoiceSummary};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentStatus};
