use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{BillingError, Result};

/// How payments for a dossier get allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    Automatic,
    Manual,
}

impl AllocationMode {
    pub fn is_manual(&self) -> bool {
        matches!(self, AllocationMode::Manual)
    }
}

impl From<bool> for AllocationMode {
    fn from(manual: bool) -> Self {
        if manual {
            AllocationMode::Manual
        } else {
            AllocationMode::Automatic
        }
    }
}

impl FromStr for AllocationMode {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(AllocationMode::Manual),
            "automatic" | "auto" => Ok(AllocationMode::Automatic),
            _ => Err(BillingError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationMode::Automatic => write!(f, "automatic"),
            AllocationMode::Manual => write!(f, "manual"),
        }
    }
}

/// A billing case grouping invoices for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dossier {
    pub id: Uuid,
    pub reference: String,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub manual_allocation: bool,
    #[serde(default)]
    pub mode_changed_by: Option<String>,
    #[serde(default)]
    pub mode_changed_at: Option<DateTime<Utc>>,
}

impl Dossier {
    pub fn mode(&self) -> AllocationMode {
        AllocationMode::from(self.manual_allocation)
    }

    pub fn matches(&self, reference: &str) -> bool {
        self.reference == reference || self.id.to_string() == reference
    }
}
