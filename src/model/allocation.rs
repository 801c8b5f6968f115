use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PaymentMethod;

/// One line of a manual allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub invoice_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Invoice columns embedded in an allocation listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedInvoice {
    pub number: String,
    pub amount_total: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Payment columns embedded in an allocation listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedPayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
}

/// An allocation row joined with its invoice and payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationDetail {
    #[serde(flatten)]
    pub allocation: PaymentAllocation,
    #[serde(rename = "invoices", default)]
    pub invoice: Option<AllocatedInvoice>,
    #[serde(rename = "payments", default)]
    pub payment: Option<AllocatedPayment>,
}

impl AllocationDetail {
    pub fn invoice_label(&self) -> String {
        self.invoice
            .as_ref()
            .map(|i| i.number.clone())
            .unwrap_or_else(|| self.allocation.invoice_id.to_string())
    }
}
