use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BillingError, Result};

/// Cash received for a dossier outside the invoice/payment ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashSettlement {
    pub id: Uuid,
    pub dossier_id: Uuid,
    pub amount: Decimal,
    pub received_on: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub recorded_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCashSettlement {
    pub dossier_id: Uuid,
    pub amount: Decimal,
    pub received_on: NaiveDate,
    pub notes: Option<String>,
}

impl NewCashSettlement {
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(BillingError::InvalidSettlementAmount);
        }
        Ok(())
    }
}
