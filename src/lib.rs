pub mod allocation;
pub mod backend;
pub mod config;
pub mod dossier;
pub mod error;
pub mod model;
pub mod money;
pub mod repository;

pub use allocation::{AllocationDraft, AllocationPath, AllocationState};
pub use backend::{Backend, MemoryBackend, RestBackend};
pub use config::{Actor, Config};
pub use error::{BillingError, Result};
pub use repository::Repository;
