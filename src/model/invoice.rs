use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Payment status of an invoice, derived from its balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Unpaid,
    Partial,
    Paid,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Unpaid => write!(f, "UNPAID"),
            InvoiceStatus::Partial => write!(f, "PARTIAL"),
            InvoiceStatus::Paid => write!(f, "PAID"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub number: String,
    pub customer_id: Uuid,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub amount_total: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
}

impl InvoiceSummary {
    /// Balance still open on the invoice, never negative.
    pub fn remaining(&self) -> Decimal {
        (self.amount_total - self.amount_paid).max(Decimal::ZERO)
    }

    pub fn status(&self) -> InvoiceStatus {
        if self.remaining() <= Decimal::ZERO {
            InvoiceStatus::Paid
        } else if self.amount_paid > Decimal::ZERO {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Unpaid
        }
    }

    /// Match by invoice number or id, as typed on the command line.
    pub fn matches(&self, reference: &str) -> bool {
        self.number == reference || self.id.to_string() == reference
    }
}

/// Filter for open invoice listings; also the cache key for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InvoiceQuery {
    pub customer_id: Option<Uuid>,
    pub include_partial: bool,
}

impl InvoiceQuery {
    pub fn for_customer(customer_id: Uuid) -> Self {
        Self {
            customer_id: Some(customer_id),
            include_partial: true,
        }
    }

    pub fn admits(&self, invoice: &InvoiceSummary) -> bool {
        if let Some(customer) = self.customer_id {
            if invoice.customer_id != customer {
                return false;
            }
        }
        match invoice.status() {
            InvoiceStatus::Unpaid => true,
            InvoiceStatus::Partial => self.include_partial,
            InvoiceStatus::Paid => false,
        }
    }
}

/// Display order: due date ascending (undated last), then invoice number.
pub fn sort_for_display(invoices: &mut [InvoiceSummary]) {
    invoices.sort_by(|a, b| {
        let by_date = match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_date.then_with(|| a.number.cmp(&b.number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(number: &str, due: Option<&str>, total: i64, paid: i64) -> InvoiceSummary {
        InvoiceSummary {
            id: Uuid::new_v4(),
            number: number.to_string(),
            customer_id: Uuid::nil(),
            customer_name: None,
            due_date: due.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            amount_total: Decimal::new(total, 2),
            amount_paid: Decimal::new(paid, 2),
        }
    }

    #[test]
    fn test_status_follows_balance() {
        assert_eq!(invoice("A", None, 10000, 0).status(), InvoiceStatus::Unpaid);
        assert_eq!(invoice("A", None, 10000, 4000).status(), InvoiceStatus::Partial);
        assert_eq!(invoice("A", None, 10000, 10000).status(), InvoiceStatus::Paid);
        // Overpaid rows clamp to zero remaining
        assert_eq!(invoice("A", None, 10000, 12000).remaining(), Decimal::ZERO);
    }

    #[test]
    fn test_query_excludes_partial_unless_requested() {
        let partial = invoice("A", None, 10000, 4000);
        let strict = InvoiceQuery {
            customer_id: None,
            include_partial: false,
        };
        assert!(!strict.admits(&partial));
        assert!(InvoiceQuery::for_customer(Uuid::nil()).admits(&partial));
        assert!(!InvoiceQuery::for_customer(Uuid::new_v4()).admits(&partial));
    }

    #[test]
    fn test_display_order() {
        let mut list = vec![
            invoice("F-3", None, 100, 0),
            invoice("F-2", Some("2026-03-01"), 100, 0),
            invoice("F-1", Some("2026-03-01"), 100, 0),
            invoice("F-0", Some("2026-04-01"), 100, 0),
        ];
        sort_for_display(&mut list);
        let numbers: Vec<_> = list.iter().map(|i| i.number.as_str()).collect();
        assert_eq!(numbers, ["F-1", "F-2", "F-0", "F-3"]);
    }
}
