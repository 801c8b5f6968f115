use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Config directory not found at {0}. Run 'billing init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("No operator identity. Pass --as <name>, set BILLING_ACTOR, or add [operator] name to config.toml")]
    MissingIdentity,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend request failed: {0}")]
    Transport(#[from] ureq::Error),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Unexpected backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend returned no row for {0}")]
    EmptyResponse(String),

    #[error("Payment amount must be greater than zero")]
    InvalidPaymentAmount,

    #[error("Cash settlement amount must be greater than zero")]
    InvalidSettlementAmount,

    #[error("Allocation for invoice {invoice} cannot be negative ({amount})")]
    NegativeAllocation { invoice: String, amount: Decimal },

    #[error("Allocation of {amount} exceeds the remaining balance of invoice {invoice} ({remaining} remaining)")]
    AllocationExceedsBalance {
        invoice: String,
        amount: Decimal,
        remaining: Decimal,
    },

    #[error("Allocations exceed the payment by {excess} (remaining to allocate: {remaining})")]
    OverAllocated { excess: Decimal, remaining: Decimal },

    #[error("At least one allocation required")]
    NoAllocations,

    #[error("Payment {payment} was recorded but its allocations were not saved: {source}. Finish with 'billing allocate {payment}'.")]
    AllocationAfterCreate {
        payment: uuid::Uuid,
        #[source]
        source: Box<BillingError>,
    },

    #[error("Invalid allocation format '{0}'. Expected 'invoice:amount' (e.g., 'F-2024-0012:60.00')")]
    InvalidAllocationFormat(String),

    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("Invoice '{0}' is not an open invoice for this payment")]
    UnknownInvoice(String),

    #[error("Allocation '{0}' not found")]
    AllocationNotFound(String),

    #[error("Dossier '{0}' not found")]
    DossierNotFound(String),

    #[error("Payment '{0}' not found")]
    PaymentNotFound(String),

    #[error("Payment {0} is cancelled and cannot be allocated")]
    PaymentCancelled(String),

    #[error("Invalid payment method '{0}'. Use transfer, check, card, cash or other.")]
    InvalidPaymentMethod(String),

    #[error("Invalid payment status '{0}'. Use pending, completed or cancelled.")]
    InvalidPaymentStatus(String),

    #[error("Invalid allocation mode '{0}'. Use manual or automatic.")]
    InvalidMode(String),

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD.")]
    InvalidDate(String),

    #[error("Invalid identifier '{0}'")]
    InvalidId(String),
}

pub type Result<T> = std::result::Result<T, BillingError>;
